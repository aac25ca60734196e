//! Common test utilities
#![allow(dead_code)]

use clitree::flag::{CompletionHint, FlagSpec};
use clitree::tree::{Command, CommandTree};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// The tree most integration tests run against:
///
/// ```text
/// app            -v/--verbose, -o/--output, --config (persistent), -l/--level
/// ├── server|srv -p/--port, -t/--tag, -m/--mode
/// │   ├── start
/// │   ├── status
/// │   └── stop   (deprecated)
/// ├── login      --token (required, APP_TOKEN), -d/--debug
/// ├── deploy     --dir; valid args staging, production
/// └── internal   (hidden)
/// ```
pub fn fixture_tree() -> CommandTree {
    CommandTree::new(
        Command::new("app")
            .description("Example application")
            .flag(FlagSpec::bool("verbose").short('v').persistent().description("Verbose output"))
            .flag(FlagSpec::string("output").short('o').persistent())
            .flag(
                FlagSpec::string("config")
                    .persistent()
                    .completion(CompletionHint::Files {
                        extensions: vec!["yml".to_string(), "yaml".to_string()],
                    }),
            )
            .flag(FlagSpec::int("level").short('l'))
            .run(|_| Ok(()))
            .subcommand(
                Command::new("server")
                    .alias("srv")
                    .description("Manage the server")
                    .flag(FlagSpec::int("port").short('p').default("8080"))
                    .flag(FlagSpec::list("tag").short('t'))
                    .flag(FlagSpec::string("mode").short('m').values(["fast", "slow"]))
                    .subcommand(Command::new("start").run(|_| Ok(())))
                    .subcommand(Command::new("status").run(|_| Ok(())))
                    .subcommand(Command::new("stop").deprecated("use halt").run(|_| Ok(()))),
            )
            .subcommand(
                Command::new("login")
                    .flag(FlagSpec::string("token").required().env("APP_TOKEN"))
                    .flag(FlagSpec::count("debug").short('d'))
                    .run(|_| Ok(())),
            )
            .subcommand(
                Command::new("deploy")
                    .valid_args(["staging", "production"])
                    .flag(FlagSpec::string("dir").completion(CompletionHint::Directories))
                    .run(|_| Ok(())),
            )
            .subcommand(Command::new("internal").hidden(true).run(|_| Ok(()))),
    )
    .unwrap()
}

/// The same tree as [`fixture_tree`], as a definition file
pub const FIXTURE_YAML: &str = r#"
name: app
description: Example application
runnable: true
flags:
  - name: verbose
    type: bool
    short: v
    persistent: true
    description: Verbose output
  - name: output
    short: o
    persistent: true
  - name: config
    persistent: true
    extensions: [yml, yaml]
  - name: level
    type: int
    short: l
commands:
  - name: server
    aliases: [srv]
    description: Manage the server
    flags:
      - name: port
        type: int
        short: p
        default: 8080
      - name: tag
        type: list
        short: t
      - name: mode
        short: m
        values: [fast, slow]
    commands:
      - name: start
      - name: status
      - name: stop
        deprecated: use halt
  - name: login
    flags:
      - name: token
        required: true
        env: APP_TOKEN
      - name: debug
        type: count
        short: d
  - name: deploy
    valid-args: [staging, production]
    flags:
      - name: dir
        complete: dirs
  - name: internal
    hidden: true
"#;

/// Create a temporary directory with a clitree.yml file
pub fn create_test_definition(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("clitree.yml");
    fs::write(&path, content).unwrap();
    (temp_dir, path)
}

/// An environment with only the given variables
pub fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
