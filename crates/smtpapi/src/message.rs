//! Outgoing email message handed to the send hooks.
//!
//! [`EmailMessage`] keeps an ordered header list, the body and a cached
//! serialization. It stands in for whatever composition library produced
//! the message: hooks only need its subject and a writable header slot.

use uuid::Uuid;

/// Splits a serialized email into its unfolded headers and its body.
///
/// The header block ends at the first empty line. Continuation lines,
/// starting with a space or a tab, are joined to the previous header with
/// a single space. When the header block is malformed (a line without a
/// colon, or a continuation without a header) the whole text is the body.
///
/// # Examples
///
/// ```rust
/// let (headers, body) = smtpapi::split_message(
///     "From: alice@example.com\r\nSubject: Quarterly\r\n report\r\n\r\nHello!"
/// );
/// assert_eq!(headers[1], ("Subject".to_string(), "Quarterly report".to_string()));
/// assert_eq!(body, "Hello!");
/// ```
///
/// ```rust
/// let (headers, body) = smtpapi::split_message("Just text");
/// assert!(headers.is_empty());
/// assert_eq!(body, "Just text");
/// ```
pub fn split_message(raw: &str) -> (Vec<(String, String)>, &str) {
    let (head, body) = match find_separator(raw) {
        Some((end, start)) => (&raw[..end], &raw[start..]),
        None => (raw, ""),
    };
    match unfold_headers(head) {
        Some(headers) => (headers, body),
        None => (Vec::new(), raw),
    }
}

/// Returns the end of the header block and the start of the body.
fn find_separator(raw: &str) -> Option<(usize, usize)> {
    let crlf = raw.find("\r\n\r\n").map(|index| (index, index + 4));
    let lf = raw.find("\n\n").map(|index| (index, index + 2));
    match (crlf, lf) {
        (Some(crlf), Some(lf)) => Some(if crlf.0 <= lf.0 { crlf } else { lf }),
        (crlf, lf) => crlf.or(lf),
    }
}

fn unfold_headers(head: &str) -> Option<Vec<(String, String)>> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in head.lines() {
        if line.starts_with([' ', '\t']) {
            let (_, value) = headers.last_mut()?;
            value.push(' ');
            value.push_str(line.trim());
            continue;
        }
        let (name, value) = line.split_once(':')?;
        if name.is_empty() || name.contains(char::is_whitespace) {
            return None;
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }
    Some(headers)
}

/// An outgoing email with structured headers.
///
/// Headers are stored as an ordered `Vec` (preserving RFC 5322 order and
/// supporting duplicate headers). Call [`rebuild`](Self::rebuild) after
/// modifying headers so that [`raw`](Self::raw) reflects the changes.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Unique message identifier, generated on construction.
    pub message_id: String,

    headers: Vec<(String, String)>,

    body: String,

    /// Cached full serialization (headers + blank line + body).
    raw: String,
}

impl EmailMessage {
    /// Composes a message from its envelope parts and body.
    pub fn compose(from: &str, to: &str, subject: &str, body: &str) -> Self {
        let mut message = Self {
            message_id: Uuid::new_v4().to_string(),
            headers: vec![
                ("From".to_string(), from.to_string()),
                ("To".to_string(), to.to_string()),
                ("Subject".to_string(), subject.to_string()),
            ],
            body: body.to_string(),
            raw: String::new(),
        };
        message.rebuild();
        message
    }

    /// Builds a message from an already serialized email, see
    /// [`split_message`] for how headers are read.
    pub fn from_raw(raw: &str) -> Self {
        let (headers, body) = split_message(raw);
        Self {
            message_id: Uuid::new_v4().to_string(),
            headers,
            body: body.to_string(),
            raw: raw.to_string(),
        }
    }

    /// Returns the first header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the email subject, empty when the header is missing.
    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or_default()
    }

    /// Assigns a header, replacing the first header with the same name
    /// (case-insensitive) or appending a new one.
    ///
    /// The cached [`raw`](Self::raw) field is **not** updated automatically.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the cached serialization, see [`rebuild`](Self::rebuild).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Rebuilds the cached [`raw`](Self::raw) field from the headers and body.
    pub fn rebuild(&mut self) {
        let headers_len: usize = self
            .headers
            .iter()
            .map(|(k, v)| k.len() + 2 + v.len() + 2)
            .sum();
        let capacity = headers_len + if self.headers.is_empty() { 0 } else { 2 } + self.body.len();

        let mut raw = String::with_capacity(capacity);
        for (key, value) in &self.headers {
            raw.push_str(key);
            raw.push_str(": ");
            raw.push_str(value);
            raw.push_str("\r\n");
        }
        if !self.headers.is_empty() {
            raw.push_str("\r\n");
        }
        raw.push_str(&self.body);

        self.raw = raw;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose() {
        let message = EmailMessage::compose("from@test.com", "to@test.com", "Hello", "Body");

        assert_eq!(message.subject(), "Hello");
        assert_eq!(message.header("from"), Some("from@test.com"));
        assert_eq!(
            message.raw(),
            "From: from@test.com\r\nTo: to@test.com\r\nSubject: Hello\r\n\r\nBody"
        );
    }

    #[test]
    fn test_from_raw() {
        let message = EmailMessage::from_raw("Subject: Test\r\n\r\nContent");

        assert_eq!(message.subject(), "Test");
        assert_eq!(message.body(), "Content");
        assert_eq!(message.raw(), "Subject: Test\r\n\r\nContent");
    }

    #[test]
    fn test_subject_missing() {
        let message = EmailMessage::from_raw("Plain text body");
        assert_eq!(message.subject(), "");
        assert!(message.headers().is_empty());
    }

    #[test]
    fn test_set_header_appends_then_replaces() {
        let mut message = EmailMessage::from_raw("Subject: Test\r\n\r\nBody");

        message.set_header("X-SMTPAPI", "{}");
        message.set_header("x-smtpapi", r#"{"filters": {}}"#);
        message.rebuild();

        assert_eq!(message.headers().len(), 2);
        assert_eq!(message.header("X-SMTPAPI"), Some(r#"{"filters": {}}"#));
        assert_eq!(
            message.raw(),
            "Subject: Test\r\nX-SMTPAPI: {\"filters\": {}}\r\n\r\nBody"
        );
    }

    #[test]
    fn test_from_raw_unfolds_headers() {
        let mut message = EmailMessage::from_raw(
            "From: a@x.com\nSubject: Monthly\n\tnewsletter\n\nLine one\n\nLine two",
        );

        assert_eq!(message.subject(), "Monthly newsletter");
        assert_eq!(message.body(), "Line one\n\nLine two");

        message.rebuild();
        assert_eq!(
            message.raw(),
            "From: a@x.com\r\nSubject: Monthly newsletter\r\n\r\nLine one\n\nLine two"
        );
    }

    #[test]
    fn test_from_raw_without_body() {
        let message = EmailMessage::from_raw("Subject: Ping");
        assert_eq!(message.subject(), "Ping");
        assert_eq!(message.body(), "");
    }

    #[test]
    fn test_split_message_malformed_head_is_body() {
        let (headers, body) = split_message(" folded: first\r\n\r\nBody");
        assert!(headers.is_empty());
        assert_eq!(body, " folded: first\r\n\r\nBody");

        let (headers, body) = split_message("Dear Bob: hello\n\nBye");
        assert!(headers.is_empty());
        assert_eq!(body, "Dear Bob: hello\n\nBye");
    }

    #[test]
    fn test_unique_message_ids() {
        let first = EmailMessage::from_raw("Body");
        let second = EmailMessage::from_raw("Body");
        assert_ne!(first.message_id, second.message_id);
    }
}
