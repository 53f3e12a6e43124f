// liveform-server - the validation endpoint behind liveform
//
// Resolves the `_request` identifier of each POST to a registered rule set,
// runs it over the submitted fields and answers 200/422/400 in the JSON
// shape the client understands. `live_validation` emits the page markup
// that boots the client on a form.

pub mod config;
pub mod directive;
pub mod handler;
pub mod registry;
pub mod response;

pub use config::Config;
pub use directive::{live_validation, RenderContext};
pub use handler::{router, AppState};
pub use registry::{RegistryError, ResolveError, RuleRegistry};
pub use response::{ErrorResponse, ValidationReply};

use anyhow::{Context, Result};

/// Build the application router from a loaded config.
pub fn app(config: &Config) -> Result<axum::Router> {
    let registry = RuleRegistry::from_config(config).context("Failed to load rule sets")?;
    Ok(router(AppState::new(registry), &config.validation.endpoint))
}
