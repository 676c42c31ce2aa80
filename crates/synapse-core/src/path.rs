//! Absolute path handling for the working-directory label of a node.
//!
//! The working directory is a label, not a mount: nothing here consults the
//! virtual filesystem.

/// Normalize an absolute path: collapse repeated separators, drop `.`
/// segments and resolve `..` (which never climbs above `/`).
///
/// Returns `None` when `path` is not absolute.
pub fn normalize_absolute(path: &str) -> Option<String> {
    if !path.starts_with('/') {
        return None;
    }
    Some(join_segments(&apply_segments(Vec::new(), path)))
}

/// Resolve `arg` against `cwd` the way `cd` does.
///
/// `/` (or any absolute path) replaces the current directory, `..` pops the
/// last segment, anything else is appended segment by segment.
pub fn resolve(cwd: &str, arg: &str) -> String {
    let arg = arg.trim();
    if arg.is_empty() {
        return normalize_absolute(cwd).unwrap_or_else(|| "/".to_string());
    }
    let base = if arg.starts_with('/') {
        Vec::new()
    } else {
        apply_segments(Vec::new(), cwd)
    };
    join_segments(&apply_segments(base, arg))
}

fn apply_segments(mut stack: Vec<String>, path: &str) -> Vec<String> {
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other.to_string()),
        }
    }
    stack
}

fn join_segments(segments: &[String]) -> String {
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}
