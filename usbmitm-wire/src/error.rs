use core::fmt;

/// Anything that can go wrong turning bytes into a [`crate::Message`] or back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Fewer bytes were available than the format being parsed requires.
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },
    /// A length field disagreed with the bytes actually present.
    LengthMismatch {
        what: &'static str,
        declared: usize,
        actual: usize,
    },
    /// A discriminant (kind, subtype, descriptor type, ...) had no known
    /// meaning in context.
    UnknownDiscriminant { what: &'static str, value: u32 },
    /// The datagram exceeds [`crate::MAX_DATAGRAM_SIZE`].
    TooLarge { len: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Truncated { what, need, have } => write!(
                f,
                "{what}: need at least {need} bytes, got {have}"
            ),
            Error::LengthMismatch {
                what,
                declared,
                actual,
            } => write!(
                f,
                "{what}: declared length {declared} does not match {actual} bytes present"
            ),
            Error::UnknownDiscriminant { what, value } => {
                write!(f, "{what}: unrecognised value {value}")
            }
            Error::TooLarge { len } => {
                write!(f, "datagram of {len} bytes exceeds the maximum datagram size")
            }
        }
    }
}

impl std::error::Error for Error {}
