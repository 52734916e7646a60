//! Path canonicalization for the Path Resolver.
//!
//! Paths are byte-oriented and never interpret `.` or `..`: those are
//! looked up as ordinary directory entries.

/// Canonical form of a user-supplied path.
///
/// An absent or empty path is the root. Repeated separators collapse, a
/// single leading `/` is ensured, and a trailing `/` is removed except for
/// the root itself.
#[must_use]
pub fn normalize_path(path: Option<&str>) -> String {
    let mut out = String::with_capacity(path.map_or(1, str::len) + 1);
    for component in components(path.unwrap_or("")) {
        out.push('/');
        out.push_str(component);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Non-empty components of `path`, in order.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Name shown when listing a single file: the canonical path without its
/// leading `/`.
#[must_use]
pub fn display_name(canonical: &str) -> &str {
    canonical.strip_prefix('/').unwrap_or(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonical_forms() {
        assert_eq!(normalize_path(None), "/");
        assert_eq!(normalize_path(Some("")), "/");
        assert_eq!(normalize_path(Some("/")), "/");
        assert_eq!(normalize_path(Some("///")), "/");
        assert_eq!(normalize_path(Some("a")), "/a");
        assert_eq!(normalize_path(Some("/a/b")), "/a/b");
        assert_eq!(normalize_path(Some("/a//b/")), "/a/b");
        assert_eq!(normalize_path(Some("a///b//c//")), "/a/b/c");
        assert_eq!(normalize_path(Some("/./..")), "/./..");
    }

    #[test]
    fn display_name_strips_root() {
        assert_eq!(display_name("/docs/readme.md"), "docs/readme.md");
        assert_eq!(display_name("/"), "");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn normalization_is_idempotent(path in "[a-c/]{0,24}") {
            let once = normalize_path(Some(&path));
            prop_assert_eq!(normalize_path(Some(&once)), once.clone());
            prop_assert!(once.starts_with('/'));
            prop_assert!(!once.contains("//"));
            prop_assert!(once == "/" || !once.ends_with('/'));
        }

        #[test]
        fn components_survive_normalization(path in "[a-c/]{0,24}") {
            let canonical = normalize_path(Some(&path));
            let before: Vec<&str> = components(&path).collect();
            let after: Vec<&str> = components(&canonical).collect();
            prop_assert_eq!(before, after);
        }
    }
}
