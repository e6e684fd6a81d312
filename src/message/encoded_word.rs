//! Header values, with [RFC 2047](https://tools.ietf.org/html/rfc2047)
//! encoded words where plain ASCII won't do

use base64::{engine::general_purpose::STANDARD, Engine};

const PREFIX: &str = "=?utf-8?b?";
const SUFFIX: &str = "?=";

/// Bytes of text per encoded word, keeps each word within 75 characters
const MAX_CHUNK_LEN: usize = 45;

fn allowed_char(c: char) -> bool {
    c >= 1 as char && c <= 9 as char
        || c == 11 as char
        || c == 12 as char
        || c >= 14 as char && c <= 127 as char
}

/// Encodes an unstructured header value, such as a subject
///
/// Values holding non-ASCII characters or line breaks become a folded
/// sequence of base64 encoded words.
pub(crate) fn encode(s: &str) -> String {
    if s.chars().all(allowed_char) {
        return s.into();
    }

    let mut words = Vec::new();
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if i - start + c.len_utf8() > MAX_CHUNK_LEN {
            words.push(word(&s[start..i]));
            start = i;
        }
    }
    words.push(word(&s[start..]));

    words.join("\r\n ")
}

fn word(chunk: &str) -> String {
    format!("{PREFIX}{}{SUFFIX}", STANDARD.encode(chunk))
}

/// Formats an address with an optional display name, as in `From`
pub(crate) fn mailbox(name: Option<&str>, address: &str) -> String {
    match name.map(str::trim).filter(|name| !name.is_empty()) {
        None => address.to_owned(),
        Some(name) if name.chars().all(allowed_char) => {
            let quoted = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{quoted}\" <{address}>")
        }
        Some(name) => format!("{} <{address}>", encode(name)),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn decode(s: &str) -> String {
        let bytes = s
            .split("\r\n ")
            .flat_map(|word| {
                let inner = &word[PREFIX.len()..word.len() - SUFFIX.len()];
                STANDARD.decode(inner).unwrap()
            })
            .collect();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn encode_ascii() {
        assert_eq!(&encode("Kayo. ?"), "Kayo. ?");
    }

    #[test]
    fn encode_utf8() {
        assert_eq!(
            &encode("Привет, мир!"),
            "=?utf-8?b?0J/RgNC40LLQtdGCLCDQvNC40YAh?="
        );
    }

    #[test]
    fn encode_line_breaks() {
        let encoded = encode("Hello\r\nBcc: everyone@example.com");

        assert!(encoded.starts_with(PREFIX));
        assert!(!encoded.contains("\r\nBcc"));
        assert_eq!(decode(&encoded), "Hello\r\nBcc: everyone@example.com");
    }

    #[test]
    fn encode_long_value_is_folded() {
        let subject = "Ж".repeat(60);
        let encoded = encode(&subject);

        assert_eq!(encoded.split("\r\n ").count(), 3);
        assert!(encoded.split("\r\n ").all(|word| word.len() <= 75));
        assert_eq!(decode(&encoded), subject);
    }

    #[test]
    fn mailbox_without_name() {
        assert_eq!(
            mailbox(None, "noreply@example.org"),
            "noreply@example.org"
        );
        assert_eq!(
            mailbox(Some("  "), "noreply@example.org"),
            "noreply@example.org"
        );
    }

    #[test]
    fn mailbox_ascii_name_is_quoted() {
        assert_eq!(
            mailbox(Some("Acme \"Deals\""), "noreply@example.org"),
            "\"Acme \\\"Deals\\\"\" <noreply@example.org>"
        );
    }

    #[test]
    fn mailbox_utf8_name_is_encoded() {
        assert_eq!(
            mailbox(Some("Привет, мир!"), "noreply@example.org"),
            "=?utf-8?b?0J/RgNC40LLQtdGCLCDQvNC40YAh?= <noreply@example.org>"
        );
    }
}
