use core::fmt;

/// Errors the transport stage can surface to its caller during setup.
/// Runtime send/receive failures are logged and swallowed instead: a
/// stage that returned `Err` here would halt the whole pipeline, which
/// the packet path is never allowed to do.
#[derive(Debug)]
pub enum Error {
    /// A configured bind or connect address could not be turned into a
    /// non-blocking socket.
    Socket(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Socket(e) => write!(f, "socket setup failed: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Socket(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Socket(e)
    }
}
