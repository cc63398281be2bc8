use thiserror::Error;

/// Failure modes of [`crate::Varlink::from_string`].
#[derive(Error, Debug)]
pub enum Error {
    /// The scanner/parser rejected the input at the given byte offset.
    #[error("syntax error at byte {offset}: expected {expected}")]
    Syntax { offset: usize, expected: String },

    /// The interface parsed, but declared the same member name more than once.
    #[error("interface `{interface}`: {message}")]
    Duplicate { interface: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<peg::error::ParseError<peg::str::LineCol>> for Error {
    fn from(e: peg::error::ParseError<peg::str::LineCol>) -> Self {
        Error::Syntax {
            offset: e.location.offset,
            expected: e.expected.to_string(),
        }
    }
}
