//! The UDP transport stage: the bridge's wire protocol over two
//! non-blocking sockets, wired into `usbmitm-engine` as a [`Stage`].

mod error;
mod socket;
mod transport;

pub use error::Error;
pub use transport::{LinkState, TransportConfig, UdpTransport};
pub use usbmitm_engine::Stage;
