// The client validator driving the real endpoint in-process.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use liveform::{
    Document, FieldOutcome, NodeId, Page, Transport, TransportError, TransportResponse,
    ValidationPayload, Validator, ValidatorOptions,
};
use liveform_server::{app, Config};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const CONFIG: &str = r#"
[validation]
allowed_namespaces = ["App\\Http\\Requests\\"]

[rule_sets."App\\Http\\Requests\\Register".rules]
email = "required|email"
name = "required|min:2"

[rule_sets."App\\Http\\Requests\\Register".attributes]
name = "full name"
"#;

const REGISTER: &str = "App\\Http\\Requests\\Register";

/// Sends payloads straight into the router.
struct RouterTransport {
    app: Router,
}

#[async_trait]
impl Transport for RouterTransport {
    async fn send(
        &self,
        endpoint: &str,
        payload: &ValidationPayload,
    ) -> Result<TransportResponse, TransportError> {
        let request = Request::builder()
            .method("POST")
            .uri(endpoint)
            .header("content-type", "application/json")
            .header("x-csrf-token", payload.token())
            .body(Body::from(serde_json::to_vec(payload)?))
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(TransportResponse::new(
            status,
            serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        ))
    }
}

fn transport() -> Arc<RouterTransport> {
    let config = Config::from_toml(CONFIG).unwrap();
    Arc::new(RouterTransport {
        app: app(&config).unwrap(),
    })
}

fn page() -> (Page, NodeId, NodeId) {
    let mut doc = Document::new();
    let body = doc.body();
    let form = doc.append_element(body, "form", &[("id", "register")]);
    doc.append_element(form, "input", &[("name", "_token"), ("type", "hidden"), ("value", "tok")]);
    let email = doc.append_element(form, "input", &[("name", "email"), ("type", "email")]);
    let name = doc.append_element(form, "input", &[("name", "name")]);
    (Page::new(doc), email, name)
}

#[tokio::test]
async fn test_field_round_trip_through_endpoint() {
    let (page, email, _) = page();
    let validator =
        Validator::new(page.clone(), "#register", ValidatorOptions::new(REGISTER), transport()).unwrap();

    assert_eq!(
        validator.validate_field("email", "not-an-email").await,
        FieldOutcome::Invalid(vec!["The email field must be a valid email address.".to_string()])
    );
    assert!(page.read(|doc| doc.has_class(email, "is-invalid")));

    assert_eq!(validator.validate_field("email", "a@b.co").await, FieldOutcome::Valid);
    assert!(page.read(|doc| doc.has_class(email, "is-valid")));
    assert!(!validator.has_errors());
}

#[tokio::test]
async fn test_whole_form_uses_attribute_labels() {
    let (page, _, name) = page();
    page.write(|doc| doc.set_value(name, "x"));
    let validator =
        Validator::new(page.clone(), "#register", ValidatorOptions::new(REGISTER), transport()).unwrap();

    assert!(!validator.validate_form().await);
    assert_eq!(
        validator.get_errors("name"),
        vec!["The full name field must be at least 2 characters."]
    );
    assert_eq!(
        validator.get_errors("email"),
        vec!["The email field is required."]
    );
}

#[tokio::test]
async fn test_unknown_rule_set_is_a_setup_fault() {
    let (page, email, _) = page();
    let validator = Validator::new(
        page.clone(),
        "#register",
        ValidatorOptions::new("App\\Http\\Requests\\Missing"),
        transport(),
    )
    .unwrap();

    assert_eq!(
        validator.validate_field("email", "x").await,
        FieldOutcome::Rejected("Request class App\\Http\\Requests\\Missing not found".to_string())
    );
    assert!(!page.read(|doc| doc.has_class(email, "is-invalid")));
    assert!(!validator.has_errors());
}
