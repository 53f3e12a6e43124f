//! String checks

/// Length in characters, which is what length rules compare against.
pub fn char_length(s: &str) -> usize {
    s.chars().count()
}

/// Checkbox-style acceptance values.
pub fn is_accepted(s: &str) -> bool {
    matches!(s, "yes" | "on" | "1" | "true")
}
