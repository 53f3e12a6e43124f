// File: src/selector.rs
// Purpose: The CSS selector subset used to find forms, fields and containers
//
// Supported: `tag`, `*`, `#id`, `.class`, `[attr]`, `[attr=value]` (quoted or
// bare), compounds of those, the descendant combinator and comma lists.

use crate::dom::{Document, NodeId};
use crate::error::SelectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(el) = doc.element(node) else {
            return false;
        };

        if let Some(tag) = &self.tag {
            if tag != "*" && !el.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if el.attribute("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.iter().all(|c| el.has_class(c)) {
            return false;
        }

        self.attrs.iter().all(|a| match (&a.value, el.attribute(&a.name)) {
            (None, found) => found.is_some(),
            (Some(expected), Some(found)) => expected == found,
            (Some(_), None) => false,
        })
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// Comma-separated alternatives; each is a descendant chain, outermost first.
    alternatives: Vec<Vec<Compound>>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        if source.trim().is_empty() {
            return Err(SelectorError::Empty);
        }

        let chars: Vec<char> = source.chars().collect();
        let unexpected = |position: usize| SelectorError::Unexpected {
            selector: source.to_string(),
            found: chars[position],
            position,
        };

        let mut alternatives = Vec::new();
        let mut chain: Vec<Compound> = Vec::new();
        let mut current = Compound::default();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                ' ' | '\t' | '\n' => {
                    if !current.is_empty() {
                        chain.push(std::mem::take(&mut current));
                    }
                    i += 1;
                }
                ',' => {
                    if !current.is_empty() {
                        chain.push(std::mem::take(&mut current));
                    }
                    if chain.is_empty() {
                        return Err(unexpected(i));
                    }
                    alternatives.push(std::mem::take(&mut chain));
                    i += 1;
                }
                '#' | '.' => {
                    let (ident, next) = read_ident(&chars, i + 1);
                    if ident.is_empty() {
                        return Err(unexpected(i));
                    }
                    if c == '#' {
                        current.id = Some(ident);
                    } else {
                        current.classes.push(ident);
                    }
                    i = next;
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|&ch| ch == ']')
                        .map(|offset| i + offset)
                        .ok_or_else(|| SelectorError::Unterminated(source.to_string()))?;
                    let body: String = chars[i + 1..close].iter().collect();
                    current.attrs.push(parse_attr(&body).ok_or_else(|| unexpected(i))?);
                    i = close + 1;
                }
                '*' if current.tag.is_none() => {
                    current.tag = Some("*".to_string());
                    i += 1;
                }
                _ if is_ident_char(c) && current.is_empty() => {
                    let (ident, next) = read_ident(&chars, i);
                    current.tag = Some(ident.to_ascii_lowercase());
                    i = next;
                }
                _ => return Err(unexpected(i)),
            }
        }

        if !current.is_empty() {
            chain.push(current);
        }
        if chain.is_empty() {
            return Err(SelectorError::Empty);
        }
        alternatives.push(chain);

        Ok(Self { alternatives })
    }

    /// Does `node` match any alternative of this selector?
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|chain| chain_matches(chain, doc, node))
    }
}

fn chain_matches(chain: &[Compound], doc: &Document, node: NodeId) -> bool {
    let Some((last, ancestors)) = chain.split_last() else {
        return false;
    };
    if !last.matches(doc, node) {
        return false;
    }

    // Descendant combinators only, so taking the nearest matching ancestor
    // for each step never loses a match.
    let mut remaining = ancestors.iter().rev().peekable();
    let mut cursor = doc.parent(node);
    while let Some(step) = remaining.peek() {
        match cursor {
            Some(ancestor) => {
                if step.matches(doc, ancestor) {
                    remaining.next();
                }
                cursor = doc.parent(ancestor);
            }
            None => return false,
        }
    }
    true
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn parse_attr(body: &str) -> Option<AttrMatch> {
    let (name, value) = match body.split_once('=') {
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (name.trim(), Some(unquoted.to_string()))
        }
        None => (body.trim(), None),
    };

    if name.is_empty() || !name.chars().all(is_ident_char) {
        return None;
    }

    Some(AttrMatch {
        name: name.to_ascii_lowercase(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, NodeId, NodeId) {
        let mut doc = Document::new();
        let body = doc.body();
        let form = doc.append_element(body, "form", &[("id", "signup"), ("class", "card wide")]);
        let wrapper = doc.append_element(form, "div", &[("class", "mb-3")]);
        let input = doc.append_element(
            wrapper,
            "input",
            &[("name", "email"), ("type", "email"), ("class", "form-control")],
        );
        (doc, form, input)
    }

    #[test]
    fn test_simple_selectors() {
        let (doc, form, input) = sample();
        assert!(Selector::parse("form").unwrap().matches(&doc, form));
        assert!(Selector::parse("#signup").unwrap().matches(&doc, form));
        assert!(Selector::parse(".card.wide").unwrap().matches(&doc, form));
        assert!(Selector::parse("[name]").unwrap().matches(&doc, input));
        assert!(Selector::parse("input[name=\"email\"]").unwrap().matches(&doc, input));
        assert!(Selector::parse("input[name='email']").unwrap().matches(&doc, input));
        assert!(!Selector::parse("input[name=phone]").unwrap().matches(&doc, input));
    }

    #[test]
    fn test_descendant_and_lists() {
        let (doc, form, input) = sample();
        assert!(Selector::parse("#signup .form-control").unwrap().matches(&doc, input));
        assert!(Selector::parse("form div input").unwrap().matches(&doc, input));
        assert!(!Selector::parse("section input").unwrap().matches(&doc, input));
        assert!(Selector::parse("textarea, form").unwrap().matches(&doc, form));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse("  "), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse("form >"),
            Err(SelectorError::Unexpected { found: '>', .. })
        ));
        assert!(matches!(
            Selector::parse("[name=email"),
            Err(SelectorError::Unterminated(_))
        ));
        assert!(matches!(
            Selector::parse(", form"),
            Err(SelectorError::Unexpected { found: ',', .. })
        ));
    }
}
