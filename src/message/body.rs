use std::{
    fmt::{self, Display},
    mem,
};

/// Longest line, without its CRLF, sent as is
///
/// <https://tools.ietf.org/html/rfc5322#section-2.1.1>
const LINE_LENGTH_LIMIT: usize = 78;

/// `Content-Transfer-Encoding` of a body part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    /// ASCII only, short lines
    SevenBit,
    /// Anything else
    QuotedPrintable,
}

impl Display for ContentTransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Self::SevenBit => "7bit",
            Self::QuotedPrintable => "quoted-printable",
        })
    }
}

/// A body part, with CRLF line endings and ready to be transmitted
#[derive(Debug, Clone)]
pub struct Body {
    buf: Vec<u8>,
    encoding: ContentTransferEncoding,
}

impl Body {
    /// Encode text, choosing the lightest encoding that keeps it intact
    ///
    /// Line endings are converted to CRLF first.
    pub fn new(text: &str) -> Self {
        let mut text = text.to_owned();
        in_place_crlf_line_endings(&mut text);

        if is_seven_bit(&text) {
            Self {
                buf: text.into_bytes(),
                encoding: ContentTransferEncoding::SevenBit,
            }
        } else {
            Self {
                buf: quoted_printable::encode(text.as_bytes()),
                encoding: ContentTransferEncoding::QuotedPrintable,
            }
        }
    }

    /// Returns the length of this `Body` in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if this `Body` has a length of zero, `false` otherwise.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the `Content-Transfer-Encoding` of this `Body`.
    #[inline]
    pub fn encoding(&self) -> ContentTransferEncoding {
        self.encoding
    }
}

impl AsRef<[u8]> for Body {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.buf.as_ref()
    }
}

/// Checks that `s`, with CRLF line endings, needs no transfer encoding
fn is_seven_bit(s: &str) -> bool {
    s.split("\r\n").all(|line| {
        line.len() <= LINE_LENGTH_LIMIT
            && line
                .bytes()
                .all(|b| b.is_ascii() && b != b'\0' && b != b'\r' && b != b'\n')
    })
}

/// In place conversion to CRLF line endings
fn in_place_crlf_line_endings(string: &mut String) {
    let indices = find_all_lf_char_indices(string);

    for i in indices {
        // relies on `indices` being in reverse order
        string.insert(i, '\r');
    }
}

/// Find indices to all places where `\r` should be inserted
/// in order to make `s` have CRLF line endings
///
/// The list is reversed, which is more efficient.
fn find_all_lf_char_indices(s: &str) -> Vec<usize> {
    let mut indices = Vec::new();

    let mut found_lf = false;
    for (i, c) in s.char_indices().rev() {
        if mem::take(&mut found_lf) && c != '\r' {
            // the previous character was `\n`, but this isn't a `\r`
            indices.push(i + c.len_utf8());
        }

        found_lf = c == '\n';
    }

    if found_lf {
        // the first character is `\n`
        indices.push(0);
    }

    indices
}
