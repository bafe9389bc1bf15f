//! Remote paths use `/` as separator. A directory path never ends with a
//! separator and the root directory is the empty string, so that
//! `join(parent, name)` always yields the entry's full path.

pub const SEPARATOR: char = '/';

/// Strip trailing separators. `"/"` becomes the root, `""`.
pub fn normalize(path: &str) -> &str {
    path.trim_end_matches(SEPARATOR)
}

pub fn join(parent: &str, name: &str) -> String {
    format!("{}{SEPARATOR}{name}", normalize(parent))
}

/// Split a full path into `(parent, name)`.
pub fn split(full: &str) -> (&str, &str) {
    let full = normalize(full);
    match full.rsplit_once(SEPARATOR) {
        Some((parent, name)) => (parent, name),
        None => ("", full),
    }
}

/// Compare two paths ignoring trailing separators.
pub fn same(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}
