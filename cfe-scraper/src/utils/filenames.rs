//! Filesystem-safe names for the extraction tree

/// Replace characters that are unsafe in path components with `_`.
///
/// Dots are replaced too so a name can never become `..` or carry an extension.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' => '_',
            other => other,
        })
        .collect()
}
