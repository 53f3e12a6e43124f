//! Primitive value checks used by the declarative rules.

pub mod email;
pub mod string;

pub use email::*;
pub use string::*;
