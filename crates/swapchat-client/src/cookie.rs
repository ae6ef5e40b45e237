/// Value of cookie `name` in a `Cookie` header, or an empty string.
///
/// Mirrors the browser lookup the relay token has always used: the header
/// is prefixed with `"; "` and split on `"; name="`. Only a single match
/// counts; a missing or repeated cookie yields an empty token.
pub fn bearer_token(cookie_header: &str, name: &str) -> String {
    let header = format!("; {cookie_header}");
    let parts: Vec<&str> = header.split(&format!("; {name}=")).collect();

    match parts.as_slice() {
        [_, value] => value.split(';').next().unwrap_or_default().to_string(),
        _ => String::new(),
    }
}
