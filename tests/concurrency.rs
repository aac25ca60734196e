//! Resolution and prediction from many threads against one tree

mod common;

use clitree::complete::CompletionContext;
use clitree::parse::Resolver;
use common::{env, fixture_tree};
use std::thread;

#[test]
fn test_concurrent_resolve_and_predict() {
    let tree = fixture_tree();
    let expected = tree.resolve(&["server", "start", "-v", "a"]).unwrap();
    let expected_prediction = tree.predict(&CompletionContext::new(&["server"], "st"));

    thread::scope(|scope| {
        for worker in 0..8 {
            let tree = &tree;
            let expected = &expected;
            let expected_prediction = &expected_prediction;
            scope.spawn(move || {
                let vars = env(&[("APP_TOKEN", "t")]);
                let resolver = Resolver::new(tree).with_env(&vars);
                for i in 0..200 {
                    let record = resolver.resolve(&["server", "start", "-v", "a"]).unwrap();
                    assert_eq!(&record, expected);

                    let port = (worker * 1000 + i).to_string();
                    let record = resolver.resolve(&["srv", "--port", port.as_str()]).unwrap();
                    assert_eq!(record.get_str("port"), None);
                    assert_eq!(record.get_int("port"), Some((worker * 1000 + i) as i64));

                    assert_eq!(resolver.resolve(&["login"]).unwrap().get_str("token"), Some("t"));
                    assert_eq!(
                        &resolver.predict(&CompletionContext::new(&["server"], "st")),
                        expected_prediction
                    );
                }
            });
        }
    });
}
