//! Virtual path utilities.
//!
//! A vpath is a `/`-delimited, case-insensitive logical path such as
//! `sprites/Surge.spr`. Backslashes are accepted and treated as forward slashes.

use std::cmp::Ordering;

/// Maximum length of a game id.
pub const MAX_GAMEID_LEN: usize = 80;

/// Scheme of the unresolvable path returned for asset misses.
pub const MISS_SCHEME: &str = "surge://";

/// Marker returned instead of a miss path when the vpath itself is unsafe.
pub const INVALID_MARKER: &str = "surge://invalid-vpath";

/// Normalize a vpath by replacing every backslash with a forward slash.
pub fn normalize(vpath: &str) -> String {
    vpath.replace('\\', "/")
}

/// Folds a vpath byte the way the comparator sees it.
#[inline]
fn fold(c: u8) -> u8 {
    if c == b'\\' { b'/' } else { c.to_ascii_lowercase() }
}

/// Compares two vpaths byte by byte, ignoring ASCII case and slash direction.
pub fn vpath_cmp(a: &str, b: &str) -> Ordering {
    a.bytes().map(fold).cmp(b.bytes().map(fold))
}

/// Returns `true` if two vpaths name the same asset.
pub fn vpath_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && vpath_cmp(a, b) == Ordering::Equal
}

/// Splits a vpath at its last separator.
///
/// Returns the file name and the byte length of the directory part, or `None`
/// when the vpath has no separator.
pub fn basename(vpath: &str) -> (&str, Option<usize>) {
    match vpath.rfind(['/', '\\']) {
        Some(pos) => (&vpath[pos + 1..], Some(pos)),
        None => (vpath, None),
    }
}

/// Iterates over the non-empty components of a vpath.
pub fn components(vpath: &str) -> impl Iterator<Item = &str> {
    vpath.split(['/', '\\']).filter(|c| !c.is_empty())
}

/// Whether a vpath may be used as a write target.
///
/// A sane vpath is non-empty and contains no `..`, `~` or `:`, no consecutive
/// separators, and no leading separator.
pub fn is_sane(vpath: &str) -> bool {
    let normalized = normalize(vpath);
    !normalized.is_empty()
        && !normalized.starts_with('/')
        && !normalized.contains("..")
        && !normalized.contains('~')
        && !normalized.contains(':')
        && !normalized.contains("//")
}

/// Whether `gameid` is 1 to 80 lowercase ASCII letters or digits.
pub fn is_valid_gameid(gameid: &str) -> bool {
    !gameid.is_empty()
        && gameid.len() <= MAX_GAMEID_LEN
        && gameid
            .bytes()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Deterministic, unresolvable path reported for a vpath that is not in the tree.
pub fn miss_marker(vpath: &str) -> String {
    if is_sane(vpath) {
        format!("{MISS_SCHEME}{}", normalize(vpath).to_ascii_lowercase())
    } else {
        INVALID_MARKER.to_string()
    }
}

/// Joins a directory vpath and a name, tolerating an empty directory.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Whether the vpath ends with `extension` (including the dot), ignoring case.
pub fn has_extension(vpath: &str, extension: &str) -> bool {
    vpath.len() >= extension.len()
        && vpath.is_char_boundary(vpath.len() - extension.len())
        && vpath[vpath.len() - extension.len()..].eq_ignore_ascii_case(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_replaces_backslashes() {
        assert_eq!(normalize("levels\\act1\\one.lev"), "levels/act1/one.lev");
        assert_eq!(normalize("plain"), "plain");
    }

    #[test]
    fn normalize_is_idempotent() {
        for vp in ["a\\b/c", "\\\\x", "", "A/B"] {
            let once = normalize(vp);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn comparison_ignores_case_and_slashes() {
        assert_eq!(vpath_cmp("Sprites\\Surge.SPR", "sprites/surge.spr"), Ordering::Equal);
        assert!(vpath_eq("A/B", "a\\b"));
        assert!(!vpath_eq("a/b", "a/bc"));
    }

    #[test]
    fn comparison_orders_like_lowercased_bytes() {
        assert_eq!(vpath_cmp("abc", "ABD"), Ordering::Less);
        assert_eq!(vpath_cmp("b", "A"), Ordering::Greater);
        assert_eq!(vpath_cmp("a", "a/b"), Ordering::Less);
        // '/' sorts before letters
        assert_eq!(vpath_cmp("a/z", "aa"), Ordering::Less);
    }

    #[test]
    fn basename_splits_at_last_separator() {
        assert_eq!(basename("levels/act1/one.lev"), ("one.lev", Some(11)));
        assert_eq!(basename("levels\\one.lev"), ("one.lev", Some(6)));
        assert_eq!(basename("surge.prefs"), ("surge.prefs", None));
        assert_eq!(basename("dir/"), ("", Some(3)));
    }

    #[test]
    fn components_skip_empty_segments() {
        let parts: Vec<&str> = components("a//b\\c/").collect();
        assert_eq!(parts, ["a", "b", "c"]);
    }

    #[test]
    fn sanity() {
        assert!(is_sane("screenshots/shot1.png"));
        assert!(is_sane("surge.prefs"));
        assert!(!is_sane(""));
        assert!(!is_sane("/etc/passwd"));
        assert!(!is_sane("\\windows"));
        assert!(!is_sane("../escape"));
        assert!(!is_sane("a/../b"));
        assert!(!is_sane("~/home"));
        assert!(!is_sane("c:/windows"));
        assert!(!is_sane("a//b"));
        assert!(!is_sane("a\\\\b"));
    }

    #[test]
    fn gameid_validation() {
        assert!(is_valid_gameid("surge"));
        assert!(is_valid_gameid("demo2"));
        assert!(!is_valid_gameid(""));
        assert!(!is_valid_gameid("Demo"));
        assert!(!is_valid_gameid("my-game"));
        assert!(is_valid_gameid(&"a".repeat(80)));
        assert!(!is_valid_gameid(&"a".repeat(81)));
    }

    #[test]
    fn miss_markers() {
        assert_eq!(miss_marker("Levels\\One.lev"), "surge://levels/one.lev");
        assert_eq!(miss_marker("../x"), INVALID_MARKER);
    }

    #[test]
    fn extensions() {
        assert!(has_extension("scripts/player.SS", ".ss"));
        assert!(!has_extension("scripts/player.ssx", ".ss"));
        assert!(has_extension("x", ""));
    }
}
