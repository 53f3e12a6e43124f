// File: src/config.rs
// Purpose: Validator options, callbacks and the resolved per-instance config

use crate::controller::FieldOutcome;
use crate::dom::{Document, EventKind, NodeId};
use crate::error::ConfigError;
use crate::framework::{Framework, FrameworkChoice};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Endpoint used when the `endpoint` option is not given.
pub const DEFAULT_ENDPOINT: &str = "/_liveform/validate";

/// Debounce delay in milliseconds for the `input` trigger.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Which DOM event drives validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    #[default]
    Blur,
    Input,
    Change,
}

impl Trigger {
    pub fn event_kind(self) -> EventKind {
        match self {
            Trigger::Blur => EventKind::Blur,
            Trigger::Input => EventKind::Input,
            Trigger::Change => EventKind::Change,
        }
    }
}

/// Whether messages are rendered into error containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorDisplay {
    #[default]
    Default,
    /// Only CSS classes and callbacks; containers are left alone.
    None,
}

pub type ValidateCallback = Arc<dyn Fn(&str, &FieldOutcome) + Send + Sync>;
pub type SuccessCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str, &[String]) + Send + Sync>;

/// Optional hooks fired after a field's verdict is applied.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_validate: Option<ValidateCallback>,
    pub on_success: Option<SuccessCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_validate", &self.on_validate.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Options accepted when binding a validator to a form.
///
/// Deserializes from the camelCase JSON the server-side directive emits:
///
/// ```json
/// { "request": "App\\Http\\Requests\\Register", "validateOn": "input", "debounce": 500 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorOptions {
    /// Rule-set identifier understood by the endpoint.
    #[serde(default)]
    pub request: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Falls back to the page's csrf meta tag, then the form's `_token` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,

    #[serde(default)]
    pub validate_on: Trigger,

    /// Milliseconds; only used by the `input` trigger.
    #[serde(default = "default_debounce")]
    pub debounce: u64,

    #[serde(default)]
    pub framework: FrameworkChoice,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_class: Option<String>,

    #[serde(default)]
    pub error_display: ErrorDisplay,

    #[serde(skip)]
    pub callbacks: Callbacks,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_debounce() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            request: String::new(),
            endpoint: default_endpoint(),
            csrf_token: None,
            validate_on: Trigger::default(),
            debounce: default_debounce(),
            framework: FrameworkChoice::default(),
            error_class: None,
            success_class: None,
            error_display: ErrorDisplay::default(),
            callbacks: Callbacks::default(),
        }
    }
}

impl ValidatorOptions {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            ..Self::default()
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn validate_on(mut self, trigger: Trigger) -> Self {
        self.validate_on = trigger;
        self
    }

    pub fn debounce(mut self, millis: u64) -> Self {
        self.debounce = millis;
        self
    }

    pub fn framework(mut self, framework: FrameworkChoice) -> Self {
        self.framework = framework;
        self
    }

    pub fn error_class(mut self, class: impl Into<String>) -> Self {
        self.error_class = Some(class.into());
        self
    }

    pub fn success_class(mut self, class: impl Into<String>) -> Self {
        self.success_class = Some(class.into());
        self
    }

    pub fn error_display(mut self, display: ErrorDisplay) -> Self {
        self.error_display = display;
        self
    }

    pub fn on_validate(mut self, f: impl Fn(&str, &FieldOutcome) + Send + Sync + 'static) -> Self {
        self.callbacks.on_validate = Some(Arc::new(f));
        self
    }

    pub fn on_success(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callbacks.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str, &[String]) + Send + Sync + 'static) -> Self {
        self.callbacks.on_error = Some(Arc::new(f));
        self
    }

    /// Reject options a validator cannot run with.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.request.trim().is_empty() {
            return Err(ConfigError::MissingRequest);
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(())
    }
}

/// Options resolved against the page at construction. Never changes after.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub request: String,
    pub endpoint: String,
    pub csrf_token: String,
    pub trigger: Trigger,
    pub debounce: Duration,
    pub framework: Framework,
    pub error_class: String,
    pub success_class: String,
    pub error_display: ErrorDisplay,
    pub callbacks: Callbacks,
}

impl ValidatorConfig {
    pub fn resolve(
        options: ValidatorOptions,
        doc: &Document,
        form: NodeId,
    ) -> Result<Self, ConfigError> {
        options.check()?;

        let framework = Framework::resolve(options.framework, doc);
        let style = framework.style();
        let csrf_token = options
            .csrf_token
            .clone()
            .unwrap_or_else(|| discover_csrf_token(doc, form));

        if csrf_token.is_empty() {
            tracing::warn!(request = %options.request, "no csrf token found for validator");
        }

        Ok(Self {
            request: options.request,
            endpoint: options.endpoint,
            csrf_token,
            trigger: options.validate_on,
            debounce: Duration::from_millis(options.debounce),
            framework,
            error_class: options
                .error_class
                .unwrap_or_else(|| style.error_class.to_string()),
            success_class: options
                .success_class
                .unwrap_or_else(|| style.success_class.to_string()),
            error_display: options.error_display,
            callbacks: options.callbacks,
        })
    }
}

/// `<meta name="csrf-token" content="...">`, else the form's `_token` field.
pub fn discover_csrf_token(doc: &Document, form: NodeId) -> String {
    let from_meta = doc
        .query_selector("meta[name=\"csrf-token\"]")
        .ok()
        .flatten()
        .and_then(|meta| doc.attribute(meta, "content"))
        .filter(|token| !token.is_empty());

    if let Some(token) = from_meta {
        return token.to_string();
    }

    doc.query_selector_in(form, "input[name=\"_token\"]")
        .ok()
        .flatten()
        .and_then(|input| doc.attribute(input, "value"))
        .unwrap_or("")
        .to_string()
}
