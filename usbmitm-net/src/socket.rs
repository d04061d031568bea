//! Non-blocking socket setup, mirroring
//! `cotton_ssdp::udp::std::setup_socket`: build with `socket2` so
//! `SO_REUSEADDR` can be set before bind, then hand the result to `mio`.

use std::net::SocketAddr;

use crate::error::Error;

pub(crate) fn bind(addr: SocketAddr) -> Result<mio::net::UdpSocket, Error> {
    let domain = if addr.is_ipv4() {
        socket2::Domain::IPV4
    } else {
        socket2::Domain::IPV6
    };
    let socket = socket2::Socket::new(domain, socket2::Type::DGRAM, None)?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(mio::net::UdpSocket::from_std(std_socket))
}

/// An ephemeral-port socket with no fixed peer yet, used for the
/// host-side send path whose destination is config, not something to
/// bind to.
pub(crate) fn bind_ephemeral() -> Result<mio::net::UdpSocket, Error> {
    let any: SocketAddr = "0.0.0.0:0".parse().unwrap();
    bind(any)
}
