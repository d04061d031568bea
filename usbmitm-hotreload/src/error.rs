use core::fmt;

/// Failures reloading a stage dylib. Only constructible when the
/// `dylib-reload` feature is enabled.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    #[cfg(feature = "dylib-reload")]
    Load(libloading::Error),
    /// The dylib loaded but didn't export `usbmitm_stage_new`.
    MissingSymbol(&'static str),
    /// The freshly-loaded stage could not be re-registered (most likely
    /// a name collision with something registered outside this module).
    Register(usbmitm_engine::EngineError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "failed to stat the stage dylib: {e}"),
            #[cfg(feature = "dylib-reload")]
            Error::Load(e) => write!(f, "failed to load the stage dylib: {e}"),
            Error::MissingSymbol(name) => {
                write!(f, "stage dylib is missing the '{name}' factory symbol")
            }
            Error::Register(e) => write!(f, "could not register reloaded stage: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(feature = "dylib-reload")]
impl From<libloading::Error> for Error {
    fn from(e: libloading::Error) -> Self {
        Error::Load(e)
    }
}
