// File: src/handler.rs
// Purpose: The validation endpoint and the router mounting it

use crate::registry::RuleRegistry;
use crate::response::{ErrorResponse, ValidationReply};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use liveform::transport::RESERVED_KEYS;
use liveform_rules::FormInput;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<RuleRegistry>,
}

impl AppState {
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// Router with the validation endpoint mounted at `endpoint`.
pub fn router(state: AppState, endpoint: &str) -> Router {
    Router::new()
        .route(endpoint, post(validate_handler))
        .with_state(state)
}

/// String form of a submitted JSON value. `null` counts as empty.
fn field_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        other => other.to_string(),
    }
}

fn reserved_str<'a>(body: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Form fields of a request body, without the reserved keys.
pub fn form_input(body: &Map<String, Value>) -> FormInput {
    body.iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), field_value(value)))
        .collect()
}

/// POST {endpoint}
/// Validate one field (`_field` given) or the whole form against the rule
/// set named by `_request`.
pub async fn validate_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<ValidationReply, ErrorResponse> {
    let Value::Object(body) = body else {
        return Err(ErrorResponse::bad_request("Request body must be a JSON object"));
    };

    let request = reserved_str(&body, "_request");
    let field = reserved_str(&body, "_field");

    let rule_set = state.registry.resolve(request).map_err(|err| {
        tracing::warn!(request = ?request, error = %err, "validation request rejected");
        ErrorResponse::from(err)
    })?;

    let input = form_input(&body);
    tracing::debug!(request = ?request, field = ?field, inputs = input.len(), "validating");

    let Err(errors) = rule_set.validate(&input, field) else {
        return Ok(ValidationReply::Valid);
    };

    let reply = match field {
        Some(field) => {
            let messages = errors.for_field(field);
            if messages.is_empty() {
                // a custom rule set reported under another key
                ValidationReply::FieldInvalid(errors.into_inner().into_values().flatten().collect())
            } else {
                ValidationReply::FieldInvalid(messages.to_vec())
            }
        }
        None => ValidationReply::FormInvalid(errors),
    };
    Ok(reply)
}
