/// Replace every character outside `[0-9A-Za-z]` with `_`.
///
/// One underscore per `char`, so distinct names may collide. An empty name
/// becomes `_` to keep exports out of the destination root itself.
pub fn sanitize_name(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
