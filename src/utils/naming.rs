//! Stored-name derivation.
//!
//! Every name that reaches the storage root goes through [`sanitize_name`], so a
//! client-supplied filename or a download token can only ever address a direct
//! child of the root.

/// Base name used when the client sends nothing usable.
pub const DEFAULT_BASE_NAME: &str = "file";

/// Byte cap on a sanitized name. Leaves room under the usual 255-byte
/// filesystem limit for a `" (k)"` suffix.
pub const MAX_NAME_BYTES: usize = 240;

/// Reduces `raw` to a single safe path segment.
///
/// Directory components (both `/` and `\` separated) are discarded, incidental
/// whitespace and double quotes around the name are trimmed, and control
/// characters are replaced. Returns `None` when nothing usable is left.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let segment = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let trimmed = segment.trim_matches(|c: char| c.is_whitespace() || c == '"');

    let sanitized: String = trimmed
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > MAX_NAME_BYTES {
        let mut end = MAX_NAME_BYTES;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    match sanitized.as_str() {
        "" | "." | ".." => None,
        _ => Some(sanitized),
    }
}

/// Like [`sanitize_name`], but degrades to [`DEFAULT_BASE_NAME`] instead of failing.
pub fn base_name_or_default(raw: &str) -> String {
    sanitize_name(raw).unwrap_or_else(|| {
        tracing::warn!("Unusable filename {:?}, falling back to '{}'", raw, DEFAULT_BASE_NAME);
        DEFAULT_BASE_NAME.to_string()
    })
}

/// Splits `name` into stem and extension (extension keeps its leading dot).
///
/// Leading dots belong to the stem, so `.env` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name.rfind('.') {
        Some(idx) if idx >= leading_dots && idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// The `attempt`-th candidate for `base`: the base itself first, then
/// `stem (1).ext`, `stem (2).ext`, ...
pub fn candidate_name(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    let (stem, ext) = split_extension(base);
    format!("{stem} ({attempt}){ext}")
}
