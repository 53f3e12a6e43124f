// liveform - live form validation against server-authoritative rules
//
// A `Validator` binds to one form in a `Page`, wires blur/input/change
// listeners on its named fields, ships the whole form to a validation
// endpoint and renders the verdict through CSS classes and error containers.

pub mod config;
pub mod container;
pub mod controller;
pub mod dom;
pub mod error;
pub mod framework;
pub mod selector;
pub mod transport;

pub use config::{Callbacks, ErrorDisplay, Trigger, ValidatorConfig, ValidatorOptions};
pub use controller::{FieldOutcome, Validator};
pub use dom::{Document, Event, EventHandler, EventKind, ListenerId, NodeId, Page};
pub use error::{ConfigError, SelectorError, TransportError};
pub use framework::{Framework, FrameworkChoice, FrameworkStyle};
pub use selector::Selector;
pub use transport::{HttpTransport, Transport, TransportResponse, ValidationPayload};
