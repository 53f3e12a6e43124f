// File: src/controller.rs
// Purpose: The validator bound to one form: event wiring, debounce timers,
// per-field error state, request sequencing and rendering of verdicts

use crate::config::{ErrorDisplay, Trigger, ValidatorConfig, ValidatorOptions};
use crate::container;
use crate::dom::{Document, Element, Event, EventHandler, ListenerId, NodeId, Page};
use crate::error::{ConfigError, TransportError};
use crate::transport::{Transport, TransportResponse, ValidationPayload};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Status the endpoint uses for failed validation.
const UNPROCESSABLE: u16 = 422;
/// Status the endpoint uses when the rule-set identifier is unusable.
const BAD_REQUEST: u16 = 400;

/// What one validation round trip did to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome {
    Valid,
    /// Messages in the order the endpoint sent them.
    Invalid(Vec<String>),
    /// The endpoint refused the rule-set identifier (a setup fault).
    Rejected(String),
    /// Any other status; nothing was changed.
    Unexpected(u16),
    /// The request never produced a response; nothing was changed.
    TransportFailed,
    /// A newer validation of the same field was queued behind this one.
    Superseded,
    /// Errors were cleared (or the validator destroyed) while in flight.
    Stale,
}

impl FieldOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, FieldOutcome::Valid)
    }
}

struct Timer {
    token: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct State {
    errors: BTreeMap<String, Vec<String>>,
    timers: HashMap<String, Timer>,
    next_timer: u64,
    /// One lock per field so only one request per field is in flight.
    field_locks: HashMap<String, Arc<AsyncMutex<()>>>,
    /// Latest call number per field; older queued calls give way to it.
    field_seq: HashMap<String, u64>,
    /// Bumped by clear/destroy so late responses can be told apart.
    generation: u64,
    in_flight: usize,
    validating: bool,
    enabled: bool,
    listeners: Vec<ListenerId>,
}

struct Inner {
    page: Page,
    form: NodeId,
    config: ValidatorConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the busy flag honest even if a validation future is dropped.
struct InFlight<'a>(&'a Inner);

impl<'a> InFlight<'a> {
    fn start(inner: &'a Inner) -> Self {
        let mut state = inner.state();
        state.in_flight += 1;
        state.validating = true;
        InFlight(inner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            state.validating = false;
        }
    }
}

/// Live validation for one form.
///
/// Cloning is cheap and every clone drives the same instance. Instances on
/// the same page never share state.
#[derive(Clone)]
pub struct Validator {
    inner: Arc<Inner>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("form", &self.inner.form)
            .field("request", &self.inner.config.request)
            .field("errors", &self.get_all_errors())
            .finish()
    }
}

/// Fields that get listeners and take part in `validate_all`.
fn is_validatable(el: &Element) -> bool {
    match el.tag.as_str() {
        "select" | "textarea" => true,
        "input" => !matches!(
            el.input_type().as_str(),
            "hidden" | "submit" | "button" | "reset" | "image"
        ),
        _ => false,
    }
}

fn validatable_fields(doc: &Document, form: NodeId) -> Vec<NodeId> {
    doc.named_fields(form)
        .into_iter()
        .filter(|node| doc.element(*node).is_some_and(is_validatable))
        .collect()
}

fn fields_named(doc: &Document, form: NodeId, name: &str) -> Vec<NodeId> {
    validatable_fields(doc, form)
        .into_iter()
        .filter(|node| doc.element(*node).and_then(Element::name) == Some(name))
        .collect()
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Value::String(message) => vec![message.clone()],
        _ => Vec::new(),
    }
}

/// Messages for `field` out of a 422 body. Single-field replies carry a flat
/// list, but a mapping is accepted too.
fn field_messages(body: &Value, field: &str) -> Vec<String> {
    let messages = match &body["errors"] {
        Value::Object(map) => map.get(field).map(string_list).unwrap_or_default(),
        other => string_list(other),
    };
    non_empty_messages(messages, field)
}

fn non_empty_messages(messages: Vec<String>, field: &str) -> Vec<String> {
    if messages.is_empty() {
        vec![format!("The {} field is invalid.", field.replace('_', " "))]
    } else {
        messages
    }
}

fn rejection_message(body: &Value) -> String {
    body["error"]
        .as_str()
        .unwrap_or("validation request rejected")
        .to_string()
}

impl Validator {
    /// Bind to the form matched by `form_selector` and attach listeners.
    pub fn new(
        page: Page,
        form_selector: &str,
        options: ValidatorOptions,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        options.check()?;

        let (form, config) = page.read(|doc| -> Result<_, ConfigError> {
            let form = doc
                .query_selector(form_selector)?
                .ok_or_else(|| ConfigError::FormNotFound(form_selector.to_string()))?;
            if doc.element(form).map(|el| el.tag.as_str()) != Some("form") {
                return Err(ConfigError::NotAForm(form_selector.to_string()));
            }
            Ok((form, ValidatorConfig::resolve(options, doc, form)?))
        })?;

        tracing::debug!(
            form = %form_selector,
            request = %config.request,
            framework = ?config.framework,
            trigger = ?config.trigger,
            "live validation bound"
        );

        let validator = Self {
            inner: Arc::new(Inner {
                page,
                form,
                config,
                transport,
                state: Mutex::new(State::default()),
            }),
        };
        validator.enable();
        Ok(validator)
    }

    /// Like [`Validator::new`], but a setup problem is logged and leaves the
    /// form without live validation instead of returning an error.
    pub fn init(
        page: Page,
        form_selector: &str,
        options: ValidatorOptions,
        transport: Arc<dyn Transport>,
    ) -> Option<Self> {
        match Self::new(page, form_selector, options, transport) {
            Ok(validator) => Some(validator),
            Err(err) => {
                tracing::error!(form = %form_selector, error = %err, "live validation not started");
                None
            }
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.inner.config
    }

    pub fn form(&self) -> NodeId {
        self.inner.form
    }

    pub fn page(&self) -> &Page {
        &self.inner.page
    }

    // ---- listeners ----

    /// Attach listeners to every named field. Calling it again while enabled
    /// does nothing.
    pub fn enable(&self) {
        let mut state = self.inner.state();
        if state.enabled {
            return;
        }

        let kind = self.inner.config.trigger.event_kind();
        let form = self.inner.form;
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);

        state.listeners = self.inner.page.write(|doc| {
            validatable_fields(doc, form)
                .into_iter()
                .map(|node| {
                    let weak = weak.clone();
                    let handler: EventHandler = Arc::new(move |event: &Event| {
                        if let Some(inner) = weak.upgrade() {
                            Validator { inner }.handle_event(event);
                        }
                    });
                    doc.add_event_listener(node, kind, handler)
                })
                .collect()
        });
        state.enabled = true;

        tracing::debug!(listeners = state.listeners.len(), "validator enabled");
    }

    /// Detach every listener `enable` attached and clear the busy flag.
    pub fn disable(&self) {
        let listeners = {
            let mut state = self.inner.state();
            state.enabled = false;
            state.validating = false;
            std::mem::take(&mut state.listeners)
        };
        self.inner.page.write(|doc| {
            for id in listeners {
                doc.remove_event_listener(id);
            }
        });
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state().enabled
    }

    fn handle_event(&self, event: &Event) {
        // The value is what the form would submit under this name, so a
        // radio group reports its checked member, not the one that fired.
        let field = self.inner.page.read(|doc| {
            let name = doc.element(event.target)?.name()?.to_string();
            let value = doc
                .form_values(self.inner.form)
                .remove(&name)
                .unwrap_or_default();
            Some((name, value))
        });
        let Some((name, value)) = field else {
            return;
        };

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(field = %name, "no async runtime; event ignored");
            return;
        };

        match self.inner.config.trigger {
            Trigger::Input => self.schedule(&runtime, name),
            Trigger::Blur | Trigger::Change => {
                let validator = self.clone();
                runtime.spawn(async move {
                    validator.validate_field(&name, &value).await;
                });
            }
        }
    }

    /// (Re)start the debounce timer for `name`, cancelling the pending one.
    fn schedule(&self, runtime: &Handle, name: String) {
        let deadline = Instant::now() + self.inner.config.debounce;
        let mut state = self.inner.state();
        state.next_timer += 1;
        let token = state.next_timer;

        let weak = Arc::downgrade(&self.inner);
        let field = name.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                Validator { inner }.fire_debounced(&field, token).await;
            }
        });

        let timer = Timer {
            token,
            handle: handle.abort_handle(),
        };
        if let Some(previous) = state.timers.insert(name, timer) {
            previous.handle.abort();
        }
    }

    async fn fire_debounced(&self, name: &str, token: u64) {
        // Once fired the timer leaves the map, so a new keystroke can no
        // longer abort the request this task is about to make.
        let current = {
            let mut state = self.inner.state();
            match state.timers.get(name) {
                Some(timer) if timer.token == token => {
                    state.timers.remove(name);
                    true
                }
                _ => false,
            }
        };
        if !current {
            return;
        }

        let value = self.current_value(name);
        self.validate_field(name, &value).await;
    }

    /// Number of debounce timers that have not fired yet.
    pub fn pending_timers(&self) -> usize {
        self.inner.state().timers.len()
    }

    // ---- validation ----

    /// Validate one field with `value`, sending the rest of the form along
    /// for cross-field rules.
    ///
    /// Calls for the same field run one at a time; a call still waiting its
    /// turn when a newer one arrives is dropped as [`FieldOutcome::Superseded`].
    pub async fn validate_field(&self, name: &str, value: &str) -> FieldOutcome {
        let (generation, seq, lock) = {
            let mut state = self.inner.state();
            let seq = {
                let counter = state.field_seq.entry(name.to_string()).or_insert(0);
                *counter += 1;
                *counter
            };
            let lock = state
                .field_locks
                .entry(name.to_string())
                .or_default()
                .clone();
            (state.generation, seq, lock)
        };

        let _turn = lock.lock().await;

        let (latest, current_generation) = {
            let state = self.inner.state();
            (state.field_seq.get(name).copied(), state.generation)
        };
        if latest != Some(seq) {
            tracing::debug!(field = %name, "validation superseded by a newer one");
            return FieldOutcome::Superseded;
        }
        if current_generation != generation {
            return FieldOutcome::Stale;
        }

        let payload = self.payload(Some((name, value)));
        let result = self.send(payload).await;

        if self.is_stale(generation) {
            tracing::debug!(field = %name, "discarding response from before a reset");
            return FieldOutcome::Stale;
        }

        let outcome = self.outcome_for_field(name, result);
        self.apply(name, &outcome);
        outcome
    }

    /// Validate every named field, each with its own request, and wait for
    /// all of them. Returns `true` when no field has errors afterwards.
    ///
    /// A field whose run is superseded is waited on until the newer call
    /// holding it finishes, so the verdict reflects that call. A reset
    /// (`Stale`) is not waited on.
    pub async fn validate_all(&self) -> bool {
        let values = self
            .inner
            .page
            .read(|doc| doc.form_values(self.inner.form));

        let runs = self.field_names().into_iter().map(|name| {
            let value = values.get(&name).cloned().unwrap_or_default();
            async move {
                if self.validate_field(&name, &value).await == FieldOutcome::Superseded {
                    self.settle(&name).await;
                }
            }
        });
        futures::future::join_all(runs).await;

        !self.has_errors()
    }

    /// Wait until every validation queued for `name` so far has finished.
    async fn settle(&self, name: &str) {
        let lock = self.inner.state().field_locks.get(name).cloned();
        if let Some(lock) = lock {
            // the lock is fair, so the calls queued ahead of us run first
            drop(lock.lock().await);
        }
    }

    /// Validate the whole form with a single request (no `_field`).
    ///
    /// Fields missing from a 422 mapping are marked valid. A 422 without a
    /// non-empty mapping changes nothing and returns `false`. A 400 reaches
    /// `on_validate` with an empty field name, since it concerns the form.
    pub async fn validate_form(&self) -> bool {
        let generation = self.inner.state().generation;
        let result = self.send(self.payload(None)).await;

        if self.is_stale(generation) {
            tracing::debug!("discarding form response from before a reset");
            return !self.has_errors();
        }

        let names = self.field_names();
        match result {
            Err(err) => {
                tracing::error!(error = %err, "form validation request failed");
            }
            Ok(response) if response.is_success() => {
                for name in &names {
                    self.apply(name, &FieldOutcome::Valid);
                }
            }
            Ok(response) if response.status == UNPROCESSABLE => {
                let errors = match response.body["errors"].as_object() {
                    Some(errors) if !errors.is_empty() => errors.clone(),
                    _ => {
                        tracing::error!(body = %response.body, "422 without a field error map");
                        return false;
                    }
                };
                for name in &names {
                    let outcome = match errors.get(name) {
                        Some(messages) => {
                            FieldOutcome::Invalid(non_empty_messages(string_list(messages), name))
                        }
                        None => FieldOutcome::Valid,
                    };
                    self.apply(name, &outcome);
                }

                let mut state = self.inner.state();
                for (field, messages) in &errors {
                    if !names.contains(field) {
                        state
                            .errors
                            .insert(field.clone(), non_empty_messages(string_list(messages), field));
                    }
                }
            }
            Ok(response) if response.status == BAD_REQUEST => {
                let message = rejection_message(&response.body);
                tracing::error!(request = %self.inner.config.request, error = %message, "validation endpoint rejected the rule set");
                self.notify("", &FieldOutcome::Rejected(message));
            }
            Ok(response) => {
                tracing::error!(status = response.status, "unexpected validation response");
            }
        }

        !self.has_errors()
    }

    fn payload(&self, field: Option<(&str, &str)>) -> ValidationPayload {
        let mut fields = self
            .inner
            .page
            .read(|doc| doc.form_values(self.inner.form));
        if let Some((name, value)) = field {
            fields.insert(name.to_string(), value.to_string());
        }
        ValidationPayload::new(
            fields,
            self.inner.config.request.clone(),
            field.map(|(name, _)| name.to_string()),
            self.inner.config.csrf_token.clone(),
        )
    }

    async fn send(
        &self,
        payload: ValidationPayload,
    ) -> Result<TransportResponse, TransportError> {
        let _busy = InFlight::start(&self.inner);
        self.inner
            .transport
            .send(&self.inner.config.endpoint, &payload)
            .await
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.inner.state().generation != generation
    }

    fn outcome_for_field(
        &self,
        name: &str,
        result: Result<TransportResponse, TransportError>,
    ) -> FieldOutcome {
        match result {
            Err(err) => {
                tracing::error!(field = %name, error = %err, "validation request failed");
                FieldOutcome::TransportFailed
            }
            Ok(response) if response.is_success() => FieldOutcome::Valid,
            Ok(response) if response.status == UNPROCESSABLE => {
                FieldOutcome::Invalid(field_messages(&response.body, name))
            }
            Ok(response) if response.status == BAD_REQUEST => {
                let message = rejection_message(&response.body);
                tracing::error!(
                    field = %name,
                    request = %self.inner.config.request,
                    error = %message,
                    "validation endpoint rejected the rule set"
                );
                FieldOutcome::Rejected(message)
            }
            Ok(response) => {
                tracing::error!(field = %name, status = response.status, "unexpected validation response");
                FieldOutcome::Unexpected(response.status)
            }
        }
    }

    /// Render an outcome and fire callbacks. Only valid/invalid change state.
    fn apply(&self, name: &str, outcome: &FieldOutcome) {
        match outcome {
            FieldOutcome::Valid => self.mark_valid(name),
            FieldOutcome::Invalid(messages) => self.mark_invalid(name, messages),
            _ => {}
        }
        self.notify(name, outcome);
    }

    fn notify(&self, name: &str, outcome: &FieldOutcome) {
        let callbacks = &self.inner.config.callbacks;
        match outcome {
            FieldOutcome::Valid => {
                if let Some(on_success) = &callbacks.on_success {
                    on_success(name);
                }
            }
            FieldOutcome::Invalid(messages) => {
                if let Some(on_error) = &callbacks.on_error {
                    on_error(name, messages);
                }
            }
            FieldOutcome::Rejected(_) => {}
            _ => return,
        }
        if let Some(on_validate) = &callbacks.on_validate {
            on_validate(name, outcome);
        }
    }

    fn mark_valid(&self, name: &str) {
        self.inner.state().errors.remove(name);

        let config = &self.inner.config;
        let form = self.inner.form;
        self.inner.page.write(|doc| {
            let nodes = fields_named(doc, form, name);
            for node in &nodes {
                doc.remove_class(*node, &config.error_class);
                doc.add_class(*node, &config.success_class);
            }
            if config.error_display == ErrorDisplay::Default {
                if let Some(container) = nodes
                    .first()
                    .and_then(|first| container::resolve(doc, *first, config.framework))
                {
                    container::clear_message(doc, container);
                }
            }
        });
    }

    fn mark_invalid(&self, name: &str, messages: &[String]) {
        self.inner
            .state()
            .errors
            .insert(name.to_string(), messages.to_vec());

        let config = &self.inner.config;
        let form = self.inner.form;
        self.inner.page.write(|doc| {
            let nodes = fields_named(doc, form, name);
            for node in &nodes {
                doc.remove_class(*node, &config.success_class);
                doc.add_class(*node, &config.error_class);
            }
            if config.error_display == ErrorDisplay::Default {
                // only the first message is rendered; the rest stay in state
                if let (Some(first), Some(message)) = (nodes.first(), messages.first()) {
                    if let Some(container) =
                        container::resolve_or_create(doc, *first, config.framework)
                    {
                        container::show_message(doc, container, message);
                    }
                }
            }
        });
    }

    fn current_value(&self, name: &str) -> String {
        self.inner.page.read(|doc| {
            doc.form_values(self.inner.form)
                .remove(name)
                .unwrap_or_default()
        })
    }

    /// Distinct names of validatable fields, in document order.
    fn field_names(&self) -> Vec<String> {
        self.inner.page.read(|doc| {
            let mut names: Vec<String> = Vec::new();
            for node in validatable_fields(doc, self.inner.form) {
                if let Some(name) = doc.element(node).and_then(Element::name) {
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                }
            }
            names
        })
    }

    // ---- state ----

    pub fn has_errors(&self) -> bool {
        !self.inner.state().errors.is_empty()
    }

    /// Messages for `name`; empty when the field has no known error.
    pub fn get_errors(&self, name: &str) -> Vec<String> {
        self.inner
            .state()
            .errors
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_all_errors(&self) -> BTreeMap<String, Vec<String>> {
        self.inner.state().errors.clone()
    }

    /// True while any validation request is in flight.
    pub fn is_validating(&self) -> bool {
        self.inner.state().validating
    }

    /// Drop every error, strip state classes and empty the containers.
    /// Responses already in flight are discarded when they arrive.
    pub fn clear_all_errors(&self) {
        {
            let mut state = self.inner.state();
            state.generation += 1;
            state.errors.clear();
        }

        let config = &self.inner.config;
        let form = self.inner.form;
        self.inner.page.write(|doc| {
            for node in validatable_fields(doc, form) {
                doc.remove_class(node, &config.error_class);
                doc.remove_class(node, &config.success_class);
                if config.error_display == ErrorDisplay::Default {
                    if let Some(container) = container::resolve(doc, node, config.framework) {
                        container::clear_message(doc, container);
                    }
                }
            }
        });
    }

    /// Cancel pending timers, detach listeners and clear all errors.
    pub fn destroy(&self) {
        let timers: Vec<Timer> = {
            let mut state = self.inner.state();
            state.timers.drain().map(|(_, timer)| timer).collect()
        };
        for timer in timers {
            timer.handle.abort();
        }

        self.disable();
        self.clear_all_errors();
        tracing::debug!(request = %self.inner.config.request, "validator destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_field_messages_flat_list() {
        let body = json!({ "valid": false, "errors": ["First.", "Second."] });
        assert_eq!(field_messages(&body, "email"), vec!["First.", "Second."]);
    }

    #[test]
    fn test_field_messages_from_mapping() {
        let body = json!({ "errors": { "email": ["Bad."], "name": ["Other."] } });
        assert_eq!(field_messages(&body, "email"), vec!["Bad."]);
    }

    #[test]
    fn test_field_messages_fallback() {
        assert_eq!(
            field_messages(&json!({ "valid": false }), "first_name"),
            vec!["The first name field is invalid."]
        );
    }

    #[test]
    fn test_rejection_message() {
        assert_eq!(
            rejection_message(&json!({ "error": "Request class is required" })),
            "Request class is required"
        );
        assert_eq!(rejection_message(&Value::Null), "validation request rejected");
    }

    #[test]
    fn test_validatable_fields_skip_buttons_and_hidden() {
        let mut doc = Document::new();
        let body = doc.body();
        let form = doc.append_element(body, "form", &[]);
        let email = doc.append_element(form, "input", &[("name", "email")]);
        doc.append_element(form, "input", &[("name", "_token"), ("type", "hidden")]);
        doc.append_element(form, "input", &[("name", "go"), ("type", "submit")]);
        let bio = doc.append_element(form, "textarea", &[("name", "bio")]);
        doc.append_element(form, "input", &[("type", "text")]);

        assert_eq!(validatable_fields(&doc, form), vec![email, bio]);
    }
}
