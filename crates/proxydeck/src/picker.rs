//! Terminal file picker for credential imports.

use std::io::IsTerminal;
use std::path::PathBuf;

use async_trait::async_trait;
use dialoguer::Input;

use proxydeck_core::{BackendError, FileFilter, FilePicker};

/// Hands back `--file` when given, otherwise asks on the terminal.
/// Non-interactive sessions without `--file` count as dismissed.
#[derive(Debug, Clone, Default)]
pub struct PromptPicker {
    preset: Option<PathBuf>,
}

impl PromptPicker {
    pub fn new(preset: Option<PathBuf>) -> Self {
        Self { preset }
    }
}

#[async_trait]
impl FilePicker for PromptPicker {
    async fn pick_file(&self, filters: &[FileFilter]) -> Result<Option<PathBuf>, BackendError> {
        let path = match &self.preset {
            Some(path) => path.clone(),
            None => {
                if !std::io::stdin().is_terminal() {
                    return Ok(None);
                }
                let prompt = prompt_for(filters);
                let answer = tokio::task::spawn_blocking(move || {
                    Input::<String>::new()
                        .with_prompt(prompt)
                        .allow_empty(true)
                        .interact_text()
                })
                .await
                .map_err(|e| BackendError::other(e.to_string()))?
                .map_err(|e| BackendError::other(format!("prompt failed: {e}")))?;

                let answer = answer.trim();
                if answer.is_empty() {
                    return Ok(None);
                }
                PathBuf::from(answer)
            }
        };

        if !filters.is_empty() && !filters.iter().any(|f| f.matches(&path)) {
            return Err(BackendError::other(format!(
                "{} does not match {}",
                path.display(),
                describe(filters)
            )));
        }
        Ok(Some(path))
    }
}

fn prompt_for(filters: &[FileFilter]) -> String {
    if filters.is_empty() {
        "Credential file (empty to cancel)".into()
    } else {
        format!("Credential file, {} (empty to cancel)", describe(filters))
    }
}

fn describe(filters: &[FileFilter]) -> String {
    filters
        .iter()
        .map(|f| {
            let exts: Vec<String> = f.extensions.iter().map(|e| format!("*.{e}")).collect();
            format!("{} ({})", f.name, exts.join(", "))
        })
        .collect::<Vec<_>>()
        .join(" or ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preset_file_is_returned() {
        let picker = PromptPicker::new(Some(PathBuf::from("/tmp/sa.json")));
        let picked = picker.pick_file(&[FileFilter::json()]).await.unwrap();
        assert_eq!(picked, Some(PathBuf::from("/tmp/sa.json")));
    }

    #[tokio::test]
    async fn preset_with_wrong_extension_is_refused() {
        let picker = PromptPicker::new(Some(PathBuf::from("/tmp/sa.txt")));
        let err = picker.pick_file(&[FileFilter::json()]).await.unwrap_err();
        assert!(err.to_string().contains("JSON (*.json)"), "got: {err}");
    }

    #[test]
    fn prompt_names_the_filter() {
        assert_eq!(
            prompt_for(&[FileFilter::json()]),
            "Credential file, JSON (*.json) (empty to cancel)"
        );
    }
}
