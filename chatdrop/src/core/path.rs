//! Helpers for normalizing destination paths captured from chat text.

/// Normalize a captured path: trim, `\` → `/`, drop leading `./`, and collapse
/// repeated slashes.
///
/// Returns `None` for empty or multi-line captures.
pub fn normalize_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains(['\n', '\r']) {
        return None;
    }
    let slashed = trimmed.replace('\\', "/");
    let mut rest = slashed.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }

    let mut out = String::with_capacity(rest.len());
    if rest.starts_with('/') {
        out.push('/');
    }
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    out.push_str(&segments.join("/"));
    if out.is_empty() || out == "/" {
        return None;
    }
    Some(out)
}

/// Why a normalized path may not be written below the target root, if at all.
pub fn escape_reason(path: &str) -> Option<&'static str> {
    if path.starts_with('/') || has_drive_prefix(path) {
        return Some("absolute path");
    }
    if path.split('/').any(|segment| segment == "..") {
        return Some("path escapes target root");
    }
    None
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_noise() {
        assert_eq!(normalize_path("  ./src//main.rs "), Some("src/main.rs".into()));
        assert_eq!(normalize_path(r"src\lib\mod.rs"), Some("src/lib/mod.rs".into()));
        assert_eq!(normalize_path("././a.txt"), Some("a.txt".into()));
    }

    #[test]
    fn normalize_rejects_empty_and_multiline() {
        assert_eq!(normalize_path("   "), None);
        assert_eq!(normalize_path("a.rs\nb.rs"), None);
        assert_eq!(normalize_path("./"), None);
    }

    #[test]
    fn escape_reason_flags_absolute_and_parent_segments() {
        assert_eq!(escape_reason("/etc/passwd"), Some("absolute path"));
        assert_eq!(escape_reason("C:/x.txt"), Some("absolute path"));
        assert_eq!(escape_reason("a/../../b"), Some("path escapes target root"));
        assert_eq!(escape_reason("a/..b/c"), None);
        assert_eq!(escape_reason("src/main.rs"), None);
    }
}
