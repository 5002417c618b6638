//! Prompt system for GeoChain.
//!
//! Every generation step (cited answering, presentation rewrite, map
//! introductions, PMESII grouping and the decision-support chain) renders a
//! prompt definition through Handlebars. Definitions ship built in and may be
//! overridden per workspace with `.geochain/prompts/<id>.yml`.

pub mod builder;
pub mod builtins;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{build_prompt, render_template};
pub use builtins::{builtin_ids, builtin_prompt};
pub use loader::{list_prompts, load_prompt};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
