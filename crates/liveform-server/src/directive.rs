// File: src/directive.rs
// Purpose: Emit the client script reference and per-form init snippets

use crate::config::ValidationConfig;
use liveform::config::DEFAULT_ENDPOINT;
use liveform::ValidatorOptions;
use maud::{html, Markup, PreEscaped};
use serde::Serialize;

/// Per-render state for [`live_validation`]. Create one per page render;
/// the shared client script is referenced at most once per context.
#[derive(Debug, Clone)]
pub struct RenderContext {
    script_src: String,
    endpoint: String,
    script_emitted: bool,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl RenderContext {
    pub fn new(script_src: impl Into<String>) -> Self {
        Self {
            script_src: script_src.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            script_emitted: false,
        }
    }

    /// Script URL and endpoint route taken from the `[validation]` config.
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.script_src.clone()).with_endpoint(config.endpoint.clone())
    }

    /// Endpoint filled in for forms whose options keep the default one.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn script_emitted(&self) -> bool {
        self.script_emitted
    }
}

/// JSON that can sit inside a `<script>` element without closing it early.
fn script_json<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json
            .replace('<', "\\u003c")
            .replace('>', "\\u003e")
            .replace('&', "\\u0026"),
        Err(err) => {
            tracing::error!(error = %err, "could not serialize validator options");
            "null".to_string()
        }
    }
}

/// Markup that starts live validation of the form at `selector` against
/// the rule set `request`.
///
/// `request` replaces whatever `options.request` holds. An endpoint left at
/// its default is replaced by the context's configured one.
pub fn live_validation(
    ctx: &mut RenderContext,
    request: &str,
    selector: &str,
    options: &ValidatorOptions,
) -> Markup {
    let mut options = options.clone();
    options.request = request.to_string();
    if options.endpoint == DEFAULT_ENDPOINT {
        options.endpoint = ctx.endpoint.clone();
    }

    let first = !ctx.script_emitted;
    ctx.script_emitted = true;

    let init = format!(
        "document.addEventListener(\"DOMContentLoaded\",function(){{LiveForm.init({},{});}});",
        script_json(selector),
        script_json(&options),
    );

    html! {
        @if first {
            script src=(ctx.script_src) defer {}
        }
        script { (PreEscaped(init)) }
    }
}
