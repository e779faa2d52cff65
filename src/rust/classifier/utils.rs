const FALLBACK_PREFIX: &str = "class_";

/// Turns arbitrary user text into a valid class label.
///
/// Every character outside `[a-zA-Z0-9]` becomes `_`, and labels that would
/// not start with an ASCII letter get the `class_` prefix. The mapping is
/// total and idempotent.
pub fn sanitize_class_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if sanitized.starts_with(|c: char| c.is_ascii_alphabetic()) {
        sanitized
    } else {
        format!("{}{}", FALLBACK_PREFIX, sanitized)
    }
}

/// Index and value of the largest finite entry.
pub(crate) fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}
