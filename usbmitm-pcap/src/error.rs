use core::fmt;

/// The only way constructing a [`crate::PcapWriter`] can fail: the
/// output file couldn't be created. Write errors once the capture is
/// running are logged and swallowed instead: the packet path never
/// raises through the engine.
#[derive(Debug)]
pub struct Error(pub std::io::Error);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not open pcap output file: {}", self.0)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}
