//! Label name helpers

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
///
/// Applied wherever a descriptor label key becomes part of a discovery
/// meta-label name or a target label name.
pub fn sanitize_label_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
