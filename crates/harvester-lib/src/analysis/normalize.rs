//! Raw metric value normalization

/// Unit suffixes stripped before numeric conversion. Millicores,
/// mebibytes and node percentages are the units `kubectl top` emits.
const UNIT_SUFFIXES: &[&str] = &["Mi", "m", "%"];

/// Strip a known unit suffix and parse the remainder as f64.
///
/// Returns `None` for values with unknown suffixes or non-numeric
/// content; such values are excluded from a field's statistics without
/// excluding the entity.
pub fn normalize(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    for suffix in UNIT_SUFFIXES {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.parse().ok();
        }
    }
    trimmed.parse().ok()
}
