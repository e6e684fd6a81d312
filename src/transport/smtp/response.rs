//! SMTP reply, containing a mandatory three-digit code and an optional,
//! possibly multiline, text

use std::{
    fmt::{Display, Formatter, Result},
    result,
    str::FromStr,
};

use nom::{
    branch::alt,
    bytes::streaming::{tag, take_until},
    character::streaming::{char, one_of, satisfy},
    combinator::{complete, opt, value},
    multi::many0,
    sequence::preceded,
    IResult, Parser,
};

use crate::error::{self, Error};

/// The first digit indicates severity
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Severity {
    /// 2yz
    PositiveCompletion = 2,
    /// 3yz
    PositiveIntermediate = 3,
    /// 4yz
    TransientNegativeCompletion = 4,
    /// 5yz
    PermanentNegativeCompletion = 5,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", *self as u8)
    }
}

/// Represents a 3 digit SMTP reply code
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Code {
    severity: Severity,
    category: u8,
    detail: u8,
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}{}{}", self.severity, self.category, self.detail)
    }
}

impl Code {
    /// Creates a new `Code` from its severity and its second and third digits
    pub fn new(severity: Severity, category: u8, detail: u8) -> Code {
        debug_assert!(category <= 5, "reply category out of range");
        debug_assert!(detail <= 9, "reply detail out of range");

        Code {
            severity,
            category,
            detail,
        }
    }

    /// First digit of the code
    pub fn severity(self) -> Severity {
        self.severity
    }

    /// Tells if the code is positive (2yz or 3yz)
    pub fn is_positive(self) -> bool {
        matches!(
            self.severity,
            Severity::PositiveCompletion | Severity::PositiveIntermediate
        )
    }
}

impl From<Code> for u16 {
    fn from(code: Code) -> Self {
        100 * code.severity as u16 + 10 * u16::from(code.category) + u16::from(code.detail)
    }
}

/// Contains an SMTP reply, with separated code and text lines
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Response {
    code: Code,
    message: Vec<String>,
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> result::Result<Response, Error> {
        parse_response(s)
            .map(|(_, r)| r)
            .map_err(|e| error::protocol("reply", None, e.to_string()))
    }
}

impl Response {
    /// Creates a new `Response`
    pub fn new(code: Code, message: Vec<String>) -> Response {
        Response { code, message }
    }

    /// Tells if the reply is positive
    pub fn is_positive(&self) -> bool {
        self.code.is_positive()
    }

    /// Tests code equality
    pub fn has_code(&self, code: u16) -> bool {
        u16::from(self.code) == code
    }

    /// Returns only the first word of the text if possible
    pub fn first_word(&self) -> Option<&str> {
        self.message
            .first()
            .and_then(|line| line.split_whitespace().next())
    }

    /// Reply code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Reply text (array of lines)
    pub fn message(&self) -> impl Iterator<Item = &str> {
        self.message.iter().map(String::as_str)
    }

    /// Reply text with lines joined by a single space
    pub fn text(&self) -> String {
        self.message.join(" ")
    }
}

fn digit(c: char) -> u8 {
    c as u8 - b'0'
}

fn parse_severity(i: &str) -> IResult<&str, Severity> {
    alt((
        value(Severity::PositiveCompletion, char('2')),
        value(Severity::PositiveIntermediate, char('3')),
        value(Severity::TransientNegativeCompletion, char('4')),
        value(Severity::PermanentNegativeCompletion, char('5')),
    ))
    .parse(i)
}

fn parse_code(i: &str) -> IResult<&str, Code> {
    (
        parse_severity,
        one_of("012345"),
        satisfy(|c: char| c.is_ascii_digit()),
    )
        .map(|(severity, category, detail)| Code {
            severity,
            category: digit(category),
            detail: digit(detail),
        })
        .parse(i)
}

/// Parses one complete reply
///
/// Returns `nom::Err::Incomplete` until the final line (`<code> <text>CRLF`)
/// has been received, so callers can keep reading.
pub(crate) fn parse_response(i: &str) -> IResult<&str, Response> {
    let (i, lines) = many0((
        parse_code,
        preceded(char('-'), take_until("\r\n")),
        tag("\r\n"),
    ))
    .parse(i)?;
    let (i, (last_code, last_line)) =
        (parse_code, opt(preceded(char(' '), take_until("\r\n")))).parse(i)?;
    let (i, _) = complete(tag("\r\n")).parse(i)?;

    // Every line of a multiline reply carries the same code
    if !lines.iter().all(|&(code, _, _)| code == last_code) {
        return Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Verify,
        )));
    }

    let mut message: Vec<String> = lines.into_iter().map(|(_, text, _)| text.into()).collect();
    message.push(last_line.unwrap_or_default().into());

    Ok((
        i,
        Response {
            code: last_code,
            message,
        },
    ))
}
