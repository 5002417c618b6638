//! Prompts command handler.

use super::print_json;
use clap::Args;
use geochain_core::{AppConfig, AppResult};
use geochain_prompt::{builtin_ids, builtin_prompt, list_prompts};

/// List built-in prompts and workspace overrides
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let overrides = list_prompts(&config.workspace)?;

        let rows: Vec<serde_json::Value> = builtin_ids()
            .into_iter()
            .map(|id| {
                let title = builtin_prompt(id).map(|p| p.title).unwrap_or_default();
                serde_json::json!({
                    "id": id,
                    "title": title,
                    "overridden": overrides.iter().any(|o| o == id),
                })
            })
            .collect();

        if self.json {
            return print_json(&rows);
        }

        for row in &rows {
            println!(
                "{:<26} {}{}",
                row["id"].as_str().unwrap_or_default(),
                row["title"].as_str().unwrap_or_default(),
                if row["overridden"].as_bool().unwrap_or(false) {
                    " (workspace override)"
                } else {
                    ""
                }
            );
        }

        let unknown: Vec<&String> = overrides
            .iter()
            .filter(|o| builtin_prompt(o).is_none())
            .collect();
        for id in unknown {
            tracing::warn!("Override {}.yml does not match any built-in prompt", id);
        }

        Ok(())
    }
}
