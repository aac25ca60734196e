//! Definition validation and tree construction
//!
//! Validation catches what the YAML types cannot express. Name and
//! duplicate checks are left to the tree builder, which reports them as
//! build errors.

use crate::config::types::{CommandDefinition, FlagDefinition, PathCompletion, TreeDefinition};
use crate::error::{ClitreeError, DefinitionError, DefinitionResult};
use crate::flag::{CompletionHint, FlagSpec};
use crate::parse::ResolverConfig;
use crate::tree::{Command, CommandTree};

/// Validate a complete definition
pub fn validate_definition(definition: &TreeDefinition) -> DefinitionResult<()> {
    if definition.root.name.is_empty() {
        return Err(DefinitionError::Invalid(
            "the root command needs a name".to_string(),
        ));
    }
    validate_command(&definition.root, &mut Vec::new())
}

fn validate_command<'d>(
    command: &'d CommandDefinition,
    path: &mut Vec<&'d str>,
) -> DefinitionResult<()> {
    path.push(&command.name);
    let location = path.join(" ");

    if command.name.is_empty() {
        return Err(DefinitionError::Invalid(format!(
            "unnamed command under '{}'",
            path[..path.len() - 1].join(" ")
        )));
    }
    if let Some(include) = &command.include {
        return Err(DefinitionError::Invalid(format!(
            "command '{}' includes '{}' but the definition was not loaded from a file",
            location, include
        )));
    }
    for flag in &command.flags {
        validate_flag(&location, flag)?;
    }
    for child in &command.commands {
        validate_command(child, path)?;
    }

    path.pop();
    Ok(())
}

/// Validate a single flag
pub fn validate_flag(command: &str, flag: &FlagDefinition) -> DefinitionResult<()> {
    let takes_value = flag.kind.takes_value();
    let path_hint = flag.complete.is_some() || !flag.extensions.is_empty();

    if !takes_value && (path_hint || !flag.values.is_empty()) {
        return Err(DefinitionError::Invalid(format!(
            "flag '{}' of command '{}' is a {} and takes no value to complete",
            flag.name, command, flag.kind
        )));
    }
    if flag.complete == Some(PathCompletion::Dirs) && !flag.extensions.is_empty() {
        return Err(DefinitionError::Invalid(format!(
            "flag '{}' of command '{}' completes directories but lists file extensions",
            flag.name, command
        )));
    }
    Ok(())
}

/// Turn a validated definition into a command tree and its resolver settings
pub fn build_tree(definition: &TreeDefinition) -> Result<(CommandTree, ResolverConfig), ClitreeError> {
    validate_definition(definition)?;
    let tree = CommandTree::new(build_command(&definition.root))?;
    Ok((tree, definition.settings.clone()))
}

fn build_command(definition: &CommandDefinition) -> Command {
    let mut command = Command::new(&definition.name)
        .aliases(definition.aliases.iter().cloned())
        .hidden(definition.hidden)
        .valid_args(definition.valid_args.iter().cloned());

    if let Some(text) = &definition.description {
        command = command.description(text);
    }
    if let Some(message) = &definition.deprecated {
        command = command.deprecated(message);
    }
    // definitions carry no behavior; runnable commands just accept the call
    if definition.is_runnable() {
        command = command.run(|_| Ok(()));
    }

    for flag in &definition.flags {
        command = command.flag(build_flag(flag));
    }
    for group in &definition.mutually_exclusive {
        command = command.mutually_exclusive(group.iter().cloned());
    }
    for group in &definition.one_required {
        command = command.one_required(group.iter().cloned());
    }
    for group in &definition.required_together {
        command = command.required_together(group.iter().cloned());
    }
    if definition.disable_flag_parsing {
        command = command.disable_flag_parsing(true);
    }
    for child in &definition.commands {
        command = command.subcommand(build_command(child));
    }
    command
}

fn build_flag(definition: &FlagDefinition) -> FlagSpec {
    let mut spec = FlagSpec::new(&definition.name, definition.kind).values(definition.values.iter().cloned());

    if let Some(c) = definition.short {
        spec = spec.short(c);
    }
    if let Some(text) = &definition.description {
        spec = spec.description(text);
    }
    if let Some(raw) = &definition.default {
        spec = spec.default(raw);
    }
    if let Some(raw) = &definition.no_opt_default {
        spec = spec.no_opt_default(raw);
    }
    if let Some(key) = &definition.env {
        spec = spec.env(key);
    }
    if let Some(message) = &definition.deprecated {
        spec = spec.deprecated(message);
    }
    if definition.required {
        spec = spec.required();
    }
    if definition.persistent {
        spec = spec.persistent();
    }
    if definition.hidden {
        spec = spec.hidden();
    }

    let extensions: Vec<String> = definition
        .extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_string())
        .collect();
    let hint = match definition.complete {
        Some(PathCompletion::Dirs) => Some(CompletionHint::Directories),
        Some(PathCompletion::Files) => Some(CompletionHint::Files { extensions }),
        None if !extensions.is_empty() => Some(CompletionHint::Files { extensions }),
        None => None,
    };
    if let Some(hint) = hint {
        spec = spec.completion(hint);
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_definition;
    use crate::error::BuildError;
    use crate::flag::FlagKind;

    fn build(yaml: &str) -> Result<(CommandTree, ResolverConfig), ClitreeError> {
        build_tree(&parse_definition(yaml, None)?)
    }

    #[test]
    fn test_build_tree_from_definition() {
        let (tree, config) = build(
            r#"
name: app
settings:
  prefix-matching: true
flags:
  - name: verbose
    type: bool
    short: v
    persistent: true
commands:
  - name: server
    aliases: [srv]
    commands:
      - name: start
        flags:
          - name: config
            extensions: [.yml, yaml]
"#,
        )
        .unwrap();

        assert!(config.prefix_matching);
        assert_eq!(tree.program_name(), "app");
        let server = tree.find(&["srv"]).unwrap();
        assert!(!tree.node(server).is_runnable());
        let start = tree.find(&["server", "start"]).unwrap();
        assert!(tree.node(start).is_runnable());

        let flags = tree.effective_flags(start);
        assert_eq!(flags.get("verbose").unwrap().spec.kind(), FlagKind::Bool);
        assert_eq!(
            flags.get("config").unwrap().spec.completion_hint(),
            Some(&CompletionHint::Files {
                extensions: vec!["yml".to_string(), "yaml".to_string()]
            })
        );
    }

    #[test]
    fn test_unnamed_root_is_rejected() {
        let result = build("commands:\n  - name: a\n");
        assert!(matches!(
            result,
            Err(ClitreeError::Definition(DefinitionError::Invalid(_)))
        ));
    }

    #[test]
    fn test_value_hint_on_bool_is_rejected() {
        let result = build(
            "name: app\nflags:\n  - name: force\n    type: bool\n    values: [yes]\n",
        );
        assert!(matches!(
            result,
            Err(ClitreeError::Definition(DefinitionError::Invalid(_)))
        ));
    }

    #[test]
    fn test_unresolved_include_is_rejected() {
        let result = build("name: app\ncommands:\n  - name: a\n    include: a.yml\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_commands_are_build_errors() {
        let result = build("name: app\ncommands:\n  - name: a\n  - name: b\n    aliases: [a]\n");
        assert!(matches!(
            result,
            Err(ClitreeError::Build(BuildError::DuplicateName { .. }))
        ));
    }

    #[test]
    fn test_groups_and_no_opt_defaults_reach_the_resolver() {
        use crate::error::ParseError;
        use crate::parse::Resolver;

        let (tree, config) = build(
            r#"
name: app
mutually-exclusive:
  - [json, yaml]
flags:
  - name: json
    type: bool
  - name: yaml
    type: bool
  - name: color
    no-opt-default: always
"#,
        )
        .unwrap();
        let resolver = Resolver::new(&tree).with_config(config);

        let record = resolver.resolve(&["--color"]).unwrap();
        assert_eq!(record.get_str("color"), Some("always"));
        assert!(matches!(
            resolver.resolve(&["--json", "--yaml"]),
            Err(ParseError::MutuallyExclusive(_))
        ));
    }

    #[test]
    fn test_group_with_unknown_member_is_a_build_error() {
        let result = build("name: app
one-required:
  - [json, nope]
flags:
  - name: json
    type: bool
");
        assert!(matches!(
            result,
            Err(ClitreeError::Build(BuildError::UnknownGroupFlag { .. }))
        ));
    }

    #[test]
    fn test_invalid_default_is_a_build_error() {
        let result = build("name: app\nflags:\n  - name: port\n    type: int\n    default: eighty\n");
        assert!(matches!(
            result,
            Err(ClitreeError::Build(BuildError::InvalidDefault { .. }))
        ));
    }
}
