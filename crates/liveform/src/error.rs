// File: src/error.rs
// Purpose: Error types for setup, selectors and transport

use thiserror::Error;

/// Problems that stop a validator from binding to its form.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the `request` option is required")]
    MissingRequest,

    #[error("the `endpoint` option must not be empty")]
    MissingEndpoint,

    #[error("form not found: {0}")]
    FormNotFound(String),

    #[error("`{0}` does not select a <form> element")]
    NotAForm(String),

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected `{found}` at {position} in selector `{selector}`")]
    Unexpected {
        selector: String,
        found: char,
        position: usize,
    },

    #[error("unterminated attribute in selector `{0}`")]
    Unterminated(String),
}

/// Network-level failures while talking to the validation endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("validation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("could not encode validation payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
