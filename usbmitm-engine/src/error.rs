use core::fmt;

/// Anything that can stop the engine's forwarding loop.
#[derive(Debug)]
pub enum EngineError {
    /// No registered stage answered an extension point that a full
    /// pipeline pass requires an answer from (e.g. nothing decoded a
    /// packet a transport stage handed over).
    NoProducer(&'static str),
    /// A stage name was already registered.
    DuplicateStage(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NoProducer(hook) => {
                write!(f, "no registered stage answered {hook}")
            }
            EngineError::DuplicateStage(name) => {
                write!(f, "a stage named '{name}' is already registered")
            }
        }
    }
}

impl std::error::Error for EngineError {}
