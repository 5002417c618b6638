//! Prompt builder: renders definitions into LLM-ready messages.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use geochain_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Render a prompt definition's system and user templates.
///
/// # Example
/// ```no_run
/// use geochain_prompt::{build_prompt, builtin_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt("map.intro").unwrap();
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "Show me ethnic groups in Mali".to_string());
/// vars.insert("country".to_string(), "Mali".to_string());
///
/// let built = build_prompt(&def, vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let system = definition
        .system
        .as_deref()
        .map(|template| render_template(template, &variables))
        .transpose()?;
    let user = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            output_format: definition.output.format.clone(),
            resolved_variables: variables,
        },
    })
}

/// Render a Handlebars template with variables, without HTML escaping.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Passages and answers carry <sup> markup that must survive verbatim
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
