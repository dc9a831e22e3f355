//! Loads prompt overrides from the workspace.

use crate::types::PromptSet;
use comply_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::path::Path;

/// Load the prompt set for a workspace.
///
/// Reads `.comply/prompts.yaml` when present; every field it omits keeps the
/// built-in template. Without the file the defaults are returned.
///
/// # Example
/// ```no_run
/// use comply_prompt::load_prompt_set;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompts = load_prompt_set(Path::new("."))?;
/// println!("{}", prompts.classifier);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt_set(workspace_path: &Path) -> AppResult<PromptSet> {
    let prompt_file = workspace_path.join(".comply").join("prompts.yaml");

    if !prompt_file.exists() {
        tracing::debug!("No prompt overrides at {:?}, using defaults", prompt_file);
        return Ok(PromptSet::default());
    }

    tracing::debug!("Loading prompt overrides from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let set: PromptSet = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt_set(&set)?;

    tracing::info!("Loaded prompt overrides from {:?}", prompt_file);

    Ok(set)
}

/// Reject empty templates and templates Handlebars cannot parse.
pub fn validate_prompt_set(set: &PromptSet) -> AppResult<()> {
    let mut handlebars = Handlebars::new();

    for (name, template) in set.templates() {
        if template.trim().is_empty() {
            return Err(AppError::Prompt(format!(
                "Prompt template '{}' cannot be empty",
                name
            )));
        }

        handlebars
            .register_template_string(name, template)
            .map_err(|e| AppError::Prompt(format!("Invalid template '{}': {}", name, e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_overrides(dir: &Path, content: &str) {
        let comply_dir = dir.join(".comply");
        fs::create_dir_all(&comply_dir).unwrap();
        fs::write(comply_dir.join("prompts.yaml"), content).unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let set = load_prompt_set(temp_dir.path()).unwrap();
        assert_eq!(set, PromptSet::default());
    }

    #[test]
    fn test_override_single_template() {
        let temp_dir = TempDir::new().unwrap();
        write_overrides(
            temp_dir.path(),
            "chitchat: \"Say hi to {{question}}\"\n",
        );

        let set = load_prompt_set(temp_dir.path()).unwrap();
        assert_eq!(set.chitchat, "Say hi to {{question}}");
        assert_eq!(set.classifier, PromptSet::default().classifier);
    }

    #[test]
    fn test_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_overrides(temp_dir.path(), "invalid: yaml: content:");
        assert!(load_prompt_set(temp_dir.path()).is_err());
    }

    #[test]
    fn test_empty_template_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_overrides(temp_dir.path(), "synthesis: \"  \"\n");
        assert!(load_prompt_set(temp_dir.path()).is_err());
    }

    #[test]
    fn test_unbalanced_template_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_overrides(temp_dir.path(), "classifier: \"{{#if question}}open\"\n");
        assert!(load_prompt_set(temp_dir.path()).is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_prompt_set(&PromptSet::default()).is_ok());
    }
}
