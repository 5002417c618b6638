//! Prompt loader: workspace overrides first, built-ins second.

use crate::builtins::builtin_prompt;
use crate::types::PromptDefinition;
use geochain_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".geochain").join("prompts")
}

/// Load a prompt definition by ID.
///
/// A file named `<id>.yml` in `.geochain/prompts/` replaces the built-in
/// definition of the same id.
///
/// # Example
/// ```no_run
/// use geochain_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "answer.cited")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    if !prompt_file.exists() {
        return builtin_prompt(prompt_id)
            .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)));
    }

    tracing::debug!("Loading prompt override from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition, prompt_id)?;

    tracing::info!("Using prompt override: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List prompt overrides present in the workspace.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let dir = prompts_dir(workspace_path);

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompt_ids: Vec<String> = walkdir::WalkDir::new(&dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file() && e.path().extension().and_then(|s| s.to_str()) == Some("yml")
        })
        .filter_map(|e| {
            e.path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .collect();

    prompt_ids.sort();
    Ok(prompt_ids)
}

fn validate_prompt(def: &PromptDefinition, expected_id: &str) -> AppResult<()> {
    if def.id != expected_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {}.yml declares id '{}'",
            expected_id, def.id
        )));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, id: &str, body: &str) {
        let prompts = prompts_dir(dir);
        fs::create_dir_all(&prompts).unwrap();
        fs::write(prompts.join(format!("{}.yml", id)), body).unwrap();
    }

    #[test]
    fn test_builtin_when_no_override() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt(temp_dir.path(), "map.intro").unwrap();
        assert_eq!(prompt.id, "map.intro");
    }

    #[test]
    fn test_override_replaces_builtin() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "map.intro",
            "id: map.intro\ntitle: Short intro\napiVersion: \"1.0\"\ntemplate: \"One line about {{country}}\"\n",
        );

        let prompt = load_prompt(temp_dir.path(), "map.intro").unwrap();
        assert_eq!(prompt.title, "Short intro");
        assert_eq!(prompt.template, "One line about {{country}}");
    }

    #[test]
    fn test_unknown_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_invalid_yaml_override() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "answer.cited", "invalid: yaml: content:");
        assert!(load_prompt(temp_dir.path(), "answer.cited").is_err());
    }

    #[test]
    fn test_mismatched_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_override(
            temp_dir.path(),
            "answer.cited",
            "id: other\ntitle: T\napiVersion: \"1.0\"\ntemplate: x\n",
        );
        assert!(load_prompt(temp_dir.path(), "answer.cited").is_err());
    }

    #[test]
    fn test_list_prompts() {
        let temp_dir = TempDir::new().unwrap();
        assert!(list_prompts(temp_dir.path()).unwrap().is_empty());

        write_override(temp_dir.path(), "pmesii.group", "id: pmesii.group");
        write_override(temp_dir.path(), "answer.cited", "id: answer.cited");

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts, vec!["answer.cited".to_string(), "pmesii.group".to_string()]);
    }
}
