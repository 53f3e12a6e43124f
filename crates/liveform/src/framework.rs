// File: src/framework.rs
// Purpose: Styling convention detection and the per-framework class table

use crate::dom::Document;
use serde::{Deserialize, Serialize};

/// Styling convention the validator renders for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framework {
    Bootstrap,
    Tailwind,
    /// No known convention on the page.
    Generic,
}

/// The `framework` option: detect, force one, or opt out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkChoice {
    #[default]
    Auto,
    Bootstrap,
    Tailwind,
    None,
}

/// Classes and container shape used for one framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameworkStyle {
    pub error_class: &'static str,
    pub success_class: &'static str,
    /// Tag of a synthesized error container.
    pub container_tag: &'static str,
    /// Classes put on a synthesized error container.
    pub container_classes: &'static [&'static str],
    /// Conventional error-class marker searched for inside the field's parent.
    pub feedback_class: Option<&'static str>,
}

const BOOTSTRAP: FrameworkStyle = FrameworkStyle {
    error_class: "is-invalid",
    success_class: "is-valid",
    container_tag: "div",
    container_classes: &["invalid-feedback"],
    feedback_class: Some("invalid-feedback"),
};

const TAILWIND: FrameworkStyle = FrameworkStyle {
    error_class: "border-red-500",
    success_class: "border-green-500",
    container_tag: "p",
    container_classes: &["mt-1", "text-sm", "text-red-600", "validation-error"],
    feedback_class: None,
};

const GENERIC: FrameworkStyle = FrameworkStyle {
    error_class: "is-invalid",
    success_class: "is-valid",
    container_tag: "div",
    container_classes: &["validation-error"],
    feedback_class: None,
};

/// Any of these classes on the page means a bootstrap-like stylesheet.
const BOOTSTRAP_MARKERS: &[&str] = &[
    "form-control",
    "form-select",
    "form-check-input",
    "invalid-feedback",
    "btn-primary",
];

/// Utility-class prefixes typical of a utility-first stylesheet.
const UTILITY_PREFIXES: &[&str] = &["bg-", "text-", "px-", "py-", "rounded", "border-"];

impl Framework {
    /// Guess the page's convention. Bootstrap markers are checked first, so
    /// a page mixing both conventions is treated as bootstrap.
    pub fn detect(doc: &Document) -> Self {
        let elements = doc.descendants(doc.root());
        let any_class = |pred: &dyn Fn(&str) -> bool| {
            elements.iter().any(|node| {
                doc.element(*node)
                    .is_some_and(|el| el.classes().iter().any(|c| pred(c)))
            })
        };

        if any_class(&|c: &str| BOOTSTRAP_MARKERS.contains(&c)) {
            Framework::Bootstrap
        } else if any_class(&|c: &str| UTILITY_PREFIXES.iter().any(|p| c.starts_with(*p))) {
            Framework::Tailwind
        } else {
            Framework::Generic
        }
    }

    /// Apply the `framework` option, detecting only for `Auto`.
    pub fn resolve(choice: FrameworkChoice, doc: &Document) -> Self {
        match choice {
            FrameworkChoice::Auto => Self::detect(doc),
            FrameworkChoice::Bootstrap => Framework::Bootstrap,
            FrameworkChoice::Tailwind => Framework::Tailwind,
            FrameworkChoice::None => Framework::Generic,
        }
    }

    pub fn style(self) -> &'static FrameworkStyle {
        match self {
            Framework::Bootstrap => &BOOTSTRAP,
            Framework::Tailwind => &TAILWIND,
            Framework::Generic => &GENERIC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn page_with_classes(classes: &[&str]) -> Document {
        let mut doc = Document::new();
        let body = doc.body();
        for class in classes {
            doc.append_element(body, "div", &[("class", *class)]);
        }
        doc
    }

    #[rstest]
    #[case(&[], Framework::Generic)]
    #[case(&["form-control"], Framework::Bootstrap)]
    #[case(&["px-4 py-2 rounded-md"], Framework::Tailwind)]
    #[case(&["bg-white", "form-select"], Framework::Bootstrap)]
    #[case(&["card", "container"], Framework::Generic)]
    fn test_detect(#[case] classes: &[&str], #[case] expected: Framework) {
        assert_eq!(Framework::detect(&page_with_classes(classes)), expected);
    }

    #[test]
    fn test_forced_choice_skips_detection() {
        let doc = page_with_classes(&["form-control"]);
        assert_eq!(Framework::resolve(FrameworkChoice::Tailwind, &doc), Framework::Tailwind);
        assert_eq!(Framework::resolve(FrameworkChoice::None, &doc), Framework::Generic);
        assert_eq!(Framework::resolve(FrameworkChoice::Auto, &doc), Framework::Bootstrap);
    }

    #[test]
    fn test_style_table() {
        assert_eq!(Framework::Bootstrap.style().error_class, "is-invalid");
        assert_eq!(Framework::Tailwind.style().container_tag, "p");
        assert_eq!(
            Framework::Generic.style().container_classes,
            &["validation-error"]
        );
    }
}
