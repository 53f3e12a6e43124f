// File: src/container.rs
// Purpose: Locate, create, fill and clear the element showing a field's error
//
// Lookup order, first match wins:
//   1. `data-error-target` on the field (a selector, trusted completely)
//   2. the framework's feedback marker inside the field's parent
//   3. a utility-styled sibling right after the field
//   4. a generic error class inside the field's parent

use crate::dom::{Document, NodeId};
use crate::framework::Framework;

/// Per-field attribute naming a custom error target.
pub const ERROR_TARGET_ATTR: &str = "data-error-target";

/// Marker class of utility-styled error messages placed after the field.
pub const UTILITY_MARKER: &str = "text-red-600";

/// Generic error classes searched in the field's parent.
pub const GENERIC_SELECTOR: &str = ".validation-error, .error-message";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    Found(NodeId),
    /// The custom target is declared but selects nothing.
    TargetMissing(String),
    NotFound,
}

fn lookup(doc: &Document, field: NodeId, framework: Framework) -> Lookup {
    if let Some(target) = doc.attribute(field, ERROR_TARGET_ATTR) {
        return match doc.query_selector(target) {
            Ok(Some(node)) => Lookup::Found(node),
            Ok(None) => Lookup::TargetMissing(target.to_string()),
            Err(err) => {
                tracing::warn!(target = %target, error = %err, "invalid error target selector");
                Lookup::TargetMissing(target.to_string())
            }
        };
    }

    let parent = doc.parent(field);

    if let (Some(parent), Some(marker)) = (parent, framework.style().feedback_class) {
        if let Ok(Some(node)) = doc.query_selector_in(parent, &format!(".{marker}")) {
            return Lookup::Found(node);
        }
    }

    if let Some(next) = doc.next_element_sibling(field) {
        if doc.has_class(next, UTILITY_MARKER) {
            return Lookup::Found(next);
        }
    }

    if let Some(parent) = parent {
        if let Ok(Some(node)) = doc.query_selector_in(parent, GENERIC_SELECTOR) {
            return Lookup::Found(node);
        }
    }

    Lookup::NotFound
}

/// Find the error container for `field` without creating one.
pub fn resolve(doc: &Document, field: NodeId, framework: Framework) -> Option<NodeId> {
    match lookup(doc, field, framework) {
        Lookup::Found(node) => Some(node),
        Lookup::TargetMissing(_) | Lookup::NotFound => None,
    }
}

/// Find the error container for `field`, creating one as the last child of
/// the field's parent when nothing matches.
///
/// Returns `None` when the field declares a custom target that selects
/// nothing (no fallback is attempted), or when the field has no parent.
pub fn resolve_or_create(doc: &mut Document, field: NodeId, framework: Framework) -> Option<NodeId> {
    match lookup(doc, field, framework) {
        Lookup::Found(node) => Some(node),
        Lookup::TargetMissing(target) => {
            tracing::warn!(target = %target, "error target selects nothing");
            None
        }
        Lookup::NotFound => {
            let parent = doc.parent(field)?;
            let style = framework.style();
            let container = doc.create_element(style.container_tag);
            for class in style.container_classes {
                doc.add_class(container, class);
            }
            doc.append_child(parent, container);
            Some(container)
        }
    }
}

/// Put `message` in the container and make it visible.
pub fn show_message(doc: &mut Document, container: NodeId, message: &str) {
    doc.set_text(container, message);
    doc.remove_attribute(container, "hidden");
}

/// Empty the container and hide it.
pub fn clear_message(doc: &mut Document, container: NodeId) {
    doc.set_text(container, "");
    doc.set_attribute(container, "hidden", "");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn field_in_group(doc: &mut Document) -> (NodeId, NodeId) {
        let body = doc.body();
        let group = doc.append_element(body, "div", &[("class", "mb-3")]);
        let field = doc.append_element(group, "input", &[("name", "email")]);
        (group, field)
    }

    #[test]
    fn test_custom_target_wins_over_bootstrap_sibling() {
        let mut doc = Document::new();
        let (group, field) = field_in_group(&mut doc);
        let feedback = doc.append_element(group, "div", &[("class", "invalid-feedback")]);
        let body = doc.body();
        let custom = doc.append_element(body, "span", &[("id", "email-errors")]);
        doc.set_attribute(field, ERROR_TARGET_ATTR, "#email-errors");

        assert_eq!(resolve(&doc, field, Framework::Bootstrap), Some(custom));
        assert_ne!(resolve(&doc, field, Framework::Bootstrap), Some(feedback));
    }

    #[test]
    fn test_missing_custom_target_does_not_fall_back() {
        let mut doc = Document::new();
        let (group, field) = field_in_group(&mut doc);
        doc.append_element(group, "div", &[("class", "invalid-feedback")]);
        doc.set_attribute(field, ERROR_TARGET_ATTR, "#nowhere");
        let before = doc.descendants(doc.root()).len();

        assert_eq!(resolve(&doc, field, Framework::Bootstrap), None);
        assert_eq!(resolve_or_create(&mut doc, field, Framework::Bootstrap), None);
        assert_eq!(doc.descendants(doc.root()).len(), before);
    }

    #[test]
    fn test_bootstrap_feedback_in_parent() {
        let mut doc = Document::new();
        let (group, field) = field_in_group(&mut doc);
        let feedback = doc.append_element(group, "div", &[("class", "invalid-feedback")]);
        assert_eq!(resolve(&doc, field, Framework::Bootstrap), Some(feedback));
        // the bootstrap marker is only a convention when bootstrap is active
        assert_eq!(resolve(&doc, field, Framework::Generic), None);
    }

    #[test]
    fn test_utility_sibling_after_field() {
        let mut doc = Document::new();
        let (group, field) = field_in_group(&mut doc);
        let hint = doc.append_element(group, "p", &[("class", "mt-1 text-sm text-red-600")]);
        assert_eq!(resolve(&doc, field, Framework::Tailwind), Some(hint));
    }

    #[test]
    fn test_generic_class_in_parent() {
        let mut doc = Document::new();
        let (group, field) = field_in_group(&mut doc);
        let label = doc.append_element(group, "label", &[]);
        let generic = doc.append_element(group, "small", &[("class", "error-message")]);
        assert_ne!(Some(label), resolve(&doc, field, Framework::Generic));
        assert_eq!(resolve(&doc, field, Framework::Generic), Some(generic));
    }

    #[test]
    fn test_create_per_framework() {
        for (framework, tag, class) in [
            (Framework::Bootstrap, "div", "invalid-feedback"),
            (Framework::Tailwind, "p", "text-red-600"),
            (Framework::Generic, "div", "validation-error"),
        ] {
            let mut doc = Document::new();
            let (group, field) = field_in_group(&mut doc);
            let created = resolve_or_create(&mut doc, field, framework).unwrap();

            assert_eq!(doc.parent(created), Some(group));
            assert_eq!(doc.children(group).last(), Some(&created));
            assert_eq!(doc.element(created).unwrap().tag, tag);
            assert!(doc.has_class(created, class));

            // a second call finds the container instead of making another
            assert_eq!(resolve_or_create(&mut doc, field, framework), Some(created));
            assert_eq!(doc.children(group).len(), 2);
        }
    }

    #[test]
    fn test_show_and_clear() {
        let mut doc = Document::new();
        let (_, field) = field_in_group(&mut doc);
        let container = resolve_or_create(&mut doc, field, Framework::Generic).unwrap();

        show_message(&mut doc, container, "Nope.");
        assert_eq!(doc.text(container), "Nope.");
        assert_eq!(doc.attribute(container, "hidden"), None);

        clear_message(&mut doc, container);
        assert_eq!(doc.text(container), "");
        assert_eq!(doc.attribute(container, "hidden"), Some(""));
    }
}
