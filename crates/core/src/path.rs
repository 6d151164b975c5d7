//! Canonical form for metadata namespace paths.

/// Canonicalize a namespace path. Total and idempotent.
///
/// - always starts with `/`
/// - empty and `.` segments are dropped, `//` collapses
/// - `..` pops the previous segment; at the root it is dropped
/// - no trailing `/` except for the root itself
pub fn normalize(path: &str) -> String {
    let mut segs: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segs.pop();
            }
            s => segs.push(s),
        }
    }
    if segs.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for s in segs {
        out.push('/');
        out.push_str(s);
    }
    out
}

/// True if `path` is already in canonical form.
pub fn is_canonical(path: &str) -> bool {
    normalize(path) == path
}
