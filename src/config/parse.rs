//! Definition file parsing and discovery

use crate::config::types::{CommandDefinition, TreeDefinition};
use crate::error::{ClitreeError, DefinitionError, DefinitionResult};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Definition file names to search for
const DEFINITION_FILE_NAMES: &[&str] = &["clitree.yml", "clitree.yaml"];

/// Find the definition file by searching current and parent directories
pub fn find_definition_file() -> DefinitionResult<PathBuf> {
    find_definition_file_from(env::current_dir().map_err(|e| {
        DefinitionError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the definition file starting from a specific directory
pub fn find_definition_file_from(start_dir: PathBuf) -> DefinitionResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in DEFINITION_FILE_NAMES {
            let path = current_dir.join(file_name);
            searched_paths.push(path.display().to_string());

            if path.is_file() {
                return Ok(path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(DefinitionError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a definition file from a path
pub fn parse_definition_file(path: &Path) -> Result<TreeDefinition, ClitreeError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| DefinitionError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_definition(&contents, Some(path))
}

/// Parse a definition from a string.
///
/// Includes are resolved relative to `path`; without a path they are left in
/// place and rejected by validation.
pub fn parse_definition(yaml: &str, path: Option<&Path>) -> Result<TreeDefinition, ClitreeError> {
    let mut definition: TreeDefinition = serde_yaml::from_str(yaml)?;

    if let Some(path) = path {
        let mut stack = vec![canonical(path)];
        process_includes(&mut definition.root, base_dir(path), &mut stack)?;
    }

    Ok(definition)
}

/// Parse the nearest definition file above the current directory
pub fn parse_definition_auto() -> Result<(TreeDefinition, PathBuf), ClitreeError> {
    let path = find_definition_file()?;
    let definition = parse_definition_file(&path)?;
    Ok((definition, path))
}

/// Replace every command carrying `include` with the included definition.
///
/// `stack` holds the files currently being expanded, outermost first.
fn process_includes(
    command: &mut CommandDefinition,
    dir: &Path,
    stack: &mut Vec<PathBuf>,
) -> DefinitionResult<()> {
    if let Some(include) = command.include.take() {
        let path = canonical(&dir.join(&include));
        if stack.contains(&path) {
            let mut chain: Vec<String> = stack.iter().map(|p| p.display().to_string()).collect();
            chain.push(path.display().to_string());
            return Err(DefinitionError::IncludeCycle(chain.join(" -> ")));
        }

        debug!(path = %path.display(), command = %command.name, "including command definition");
        let mut included = load_included_command(&path)?;
        if !command.name.is_empty() {
            included.name = std::mem::take(&mut command.name);
        }
        *command = included;

        stack.push(path.clone());
        let result = process_includes(command, base_dir(&path), stack);
        stack.pop();
        return result;
    }

    for child in &mut command.commands {
        process_includes(child, dir, stack)?;
    }
    Ok(())
}

/// Load a command from an included file
fn load_included_command(path: &Path) -> DefinitionResult<CommandDefinition> {
    let contents = fs::read_to_string(path).map_err(|e| DefinitionError::IncludeFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;

    serde_yaml::from_str(&contents).map_err(|e| DefinitionError::IncludeFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

fn base_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

/// Canonical form when the file exists, so cycles through different
/// relative spellings are still caught
fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_simple_definition() {
        let yaml = r#"
name: app
commands:
  - name: hello
"#;
        let definition = parse_definition(yaml, None).unwrap();
        assert_eq!(definition.root.name, "app");
        assert_eq!(definition.root.commands[0].name, "hello");
    }

    #[test]
    fn test_find_definition_in_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clitree.yml");
        let sub_dir = temp_dir.path().join("subdir");

        fs::create_dir(&sub_dir).unwrap();
        fs::write(&path, "name: app\n").unwrap();

        let found = find_definition_file_from(sub_dir).unwrap();
        assert_eq!(found, path);
    }

    #[test]
    fn test_definition_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = find_definition_file_from(temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(DefinitionError::NotFound(_))));
    }

    #[test]
    fn test_include_replaces_command_and_keeps_name() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clitree.yml");
        fs::create_dir(temp_dir.path().join("cmds")).unwrap();
        fs::write(
            &path,
            r#"
name: app
commands:
  - name: server
    include: cmds/server.yml
"#,
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("cmds/server.yml"),
            r#"
aliases: [srv]
commands:
  - name: start
  - name: stop
    include: stop.yml
"#,
        )
        .unwrap();
        fs::write(temp_dir.path().join("cmds/stop.yml"), "hidden: true\n").unwrap();

        let definition = parse_definition_file(&path).unwrap();
        let server = &definition.root.commands[0];
        assert_eq!(server.name, "server");
        assert_eq!(server.aliases, vec!["srv"]);
        assert_eq!(server.commands[1].name, "stop");
        assert!(server.commands[1].hidden);
        assert!(server.include.is_none());
    }

    #[test]
    fn test_include_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clitree.yml");
        fs::write(
            &path,
            "name: app\ncommands:\n  - name: a\n    include: a.yml\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("a.yml"),
            "commands:\n  - name: b\n    include: a.yml\n",
        )
        .unwrap();

        let result = parse_definition_file(&path);
        assert!(matches!(
            result,
            Err(ClitreeError::Definition(DefinitionError::IncludeCycle(_)))
        ));
    }

    #[test]
    fn test_missing_include() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clitree.yml");
        fs::write(&path, "name: app\ncommands:\n  - name: a\n    include: nope.yml\n").unwrap();

        let result = parse_definition_file(&path);
        assert!(matches!(
            result,
            Err(ClitreeError::Definition(DefinitionError::IncludeFile { .. }))
        ));
    }
}
