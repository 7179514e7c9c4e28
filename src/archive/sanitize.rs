//! Mapping of untrusted archive entry names onto relative paths.

use std::path::{Component, Path, PathBuf};

/// Result of sanitizing one entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedEntry {
    /// Relative path safe to join onto the destination. Empty for the root.
    pub path: PathBuf,
    /// Whether segments that tried to leave the destination were dropped.
    pub had_unsafe_segments: bool,
}

/// Turn an entry name (already stripped of its top-level directory) into a
/// relative path that can only resolve inside the destination.
///
/// Separators are normalized, a drive or UNC prefix is stripped, and empty,
/// `.` and `..` segments are removed. Segments the host platform would read
/// as anything other than a plain file name are removed too.
pub fn sanitize_entry(name: &str) -> SanitizedEntry {
    let normalized = name.replace('\\', "/");
    let rest = strip_prefix(&normalized);

    let mut path = PathBuf::new();
    let mut had_unsafe_segments = false;
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => had_unsafe_segments = true,
            _ if is_plain_name(segment) => path.push(segment),
            _ => had_unsafe_segments = true,
        }
    }

    SanitizedEntry {
        path,
        had_unsafe_segments,
    }
}

/// Strip a drive letter (`C:`) or UNC host/share (`//host/share`) prefix.
fn strip_prefix(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return &name[2..];
    }
    if let Some(unc) = name.strip_prefix("//") {
        let mut parts = unc.splitn(3, '/');
        let host = parts.next().unwrap_or_default();
        let share = parts.next().unwrap_or_default();
        if !host.is_empty() && !share.is_empty() {
            return parts.next().unwrap_or_default();
        }
    }
    name
}

fn is_plain_name(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(name: &str) -> PathBuf {
        sanitize_entry(name).path
    }

    #[test]
    fn test_plain_entries_unchanged() {
        assert_eq!(path("info.json"), PathBuf::from("info.json"));
        assert_eq!(path("graphics/icon.png"), Path::new("graphics").join("icon.png"));
    }

    #[test]
    fn test_backslashes_are_separators() {
        assert_eq!(path(r"locale\en\strings.cfg"), Path::new("locale").join("en").join("strings.cfg"));
    }

    #[test]
    fn test_dot_and_empty_segments_removed() {
        assert_eq!(path("./a//b/./c"), Path::new("a").join("b").join("c"));
        assert_eq!(path(""), PathBuf::new());
        assert_eq!(path("/"), PathBuf::new());
    }

    #[test]
    fn test_parent_segments_dropped() {
        let entry = sanitize_entry("../../evil");
        assert_eq!(entry.path, PathBuf::from("evil"));
        assert!(entry.had_unsafe_segments);

        let entry = sanitize_entry("a/../../b");
        assert_eq!(entry.path, Path::new("a").join("b"));
        assert!(entry.had_unsafe_segments);

        assert!(!sanitize_entry("a/b").had_unsafe_segments);
    }

    #[test]
    fn test_absolute_and_drive_prefixes_stripped() {
        assert_eq!(path("/etc/passwd"), Path::new("etc").join("passwd"));
        assert_eq!(path(r"C:\Windows\system.ini"), Path::new("Windows").join("system.ini"));
        assert_eq!(path("//server/share/x.txt"), PathBuf::from("x.txt"));
    }

    #[test]
    fn test_result_stays_under_destination() {
        let dest = Path::new("/mods/foo_1.0.0");
        for name in [
            "../../evil",
            "/abs/../../x",
            r"..\..\..\windows",
            "C:/../x",
            "a/./../../../b",
            "....//x",
        ] {
            let joined = dest.join(sanitize_entry(name).path);
            assert!(joined.starts_with(dest), "{:?} escaped to {:?}", name, joined);
            assert!(
                !joined.components().any(|c| c == Component::ParentDir),
                "{:?} kept a parent segment",
                name
            );
        }
    }
}
