//! Presentation tweaks applied to the serialized header JSON.

/// Inserts a single space after every `,` or `:` separator that is directly
/// followed by `"`, `[` or `{` in compact JSON text.
///
/// Characters inside string literals are never touched, so the parsed value
/// is identical before and after the rewrite.
///
/// # Examples
///
/// ```rust
/// assert_eq!(
///     smtpapi::space_separators(r#"{"to":["a@x.com","b@x.com"],"filters":{}}"#),
///     r#"{"to": ["a@x.com", "b@x.com"], "filters": {}}"#
/// );
/// ```
///
/// Separators before numbers are left alone:
///
/// ```rust
/// assert_eq!(
///     smtpapi::space_separators(r#"{"enabled":1,"x":"y"}"#),
///     r#"{"enabled":1, "x": "y"}"#
/// );
/// ```
///
/// String contents are preserved verbatim:
///
/// ```rust
/// assert_eq!(
///     smtpapi::space_separators(r#"{"k":"a,\"b:{"}"#),
///     r#"{"k": "a,\"b:{"}"#
/// );
/// ```
pub fn space_separators(compact: &str) -> String {
    let mut result = String::with_capacity(compact.len() + compact.len() / 8);
    let mut chars = compact.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        result.push(c);
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            ',' | ':' if matches!(chars.peek(), Some('"' | '[' | '{')) => result.push(' '),
            _ => {}
        }
    }

    result
}
