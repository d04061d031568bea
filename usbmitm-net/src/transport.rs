//! The UDP transport stage: two independent, non-blocking UDP sockets
//! — one bound to receive from the physical bridge's device side, one
//! sending to a configured host-side peer — wired into the engine as a
//! single [`Stage`].

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use mio::{Events, Interest, Poll, Token};

use usbmitm_engine::Stage;
use usbmitm_wire::management::Management;
use usbmitm_wire::message::Message;
use usbmitm_wire::MAX_DATAGRAM_SIZE;

use crate::error::Error;
use crate::socket;

const DEVICE_TOKEN: Token = Token(0);
const HOST_TOKEN: Token = Token(1);
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Which sockets to bring up and where they point. Either side may be
/// left `None` to disable it.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Local address the bridge's device-side datagrams arrive on.
    pub device_bind: Option<SocketAddr>,
    /// Address of the peer hosting the "USB host" side of the link.
    pub host_dest: Option<SocketAddr>,
}

/// `idle`/`running`: `start` (idle → running), `reset` (→ idle),
/// `reload` (idle → running).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Running,
}

struct DeviceSocket {
    io: mio::net::UdpSocket,
    /// Learned from the first datagram received: until then outbound
    /// sends toward the device are dropped.
    peer: Option<SocketAddr>,
    queue: VecDeque<Vec<u8>>,
}

struct HostSocket {
    io: mio::net::UdpSocket,
    dest: SocketAddr,
    queue: VecDeque<Vec<u8>>,
}

/// The UDP proxy stage: `device_*`/`host_*`/`send_*_packet` hooks move
/// raw bytes between the two sockets; `wait_for_packet` is the engine's
/// one blocking point, realized here as a single bounded `mio::Poll`.
pub struct UdpTransport {
    device: Option<DeviceSocket>,
    host: Option<HostSocket>,
    poll: Poll,
    events: Events,
    state: LinkState,
}

impl UdpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let poll = Poll::new()?;

        let device = match config.device_bind {
            Some(addr) => {
                let mut io = socket::bind(addr)?;
                poll.registry()
                    .register(&mut io, DEVICE_TOKEN, Interest::READABLE)?;
                Some(DeviceSocket {
                    io,
                    peer: None,
                    queue: VecDeque::new(),
                })
            }
            None => None,
        };

        let host = match config.host_dest {
            Some(dest) => {
                let mut io = socket::bind_ephemeral()?;
                poll.registry()
                    .register(&mut io, HOST_TOKEN, Interest::READABLE)?;
                Some(HostSocket {
                    io,
                    dest,
                    queue: VecDeque::new(),
                })
            }
            None => None,
        };

        Ok(UdpTransport {
            device,
            host,
            poll,
            events: Events::with_capacity(8),
            state: LinkState::Idle,
        })
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn device_local_addr(&self) -> Option<SocketAddr> {
        self.device.as_ref().and_then(|d| d.io.local_addr().ok())
    }

    /// `start`: idle → running. No wire effect of its own; the bridge
    /// starts sending as soon as it has somewhere to send to.
    pub fn start(&mut self) {
        self.state = LinkState::Running;
    }

    /// `reset`: sends `MANAGEMENT/RESET` to the device side and drops
    /// back to idle.
    pub fn reset(&mut self) {
        self.send_management(Management::Reset);
        self.state = LinkState::Idle;
    }

    /// `reload`: sends `MANAGEMENT/RELOAD` to the device side and
    /// (re)starts.
    pub fn reload(&mut self) {
        self.send_management(Management::Reload);
        self.state = LinkState::Running;
    }

    fn send_management(&mut self, m: Management) {
        let bytes = usbmitm_wire::encode_host(&Message::Management(m));
        self.send_device_packet(&bytes);
    }

    fn drain_device(&mut self) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            match device.io.recv_from(&mut buf) {
                Ok((n, from)) => {
                    device.peer = Some(from);
                    device.queue.push_back(buf[..n].to_vec());
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("device socket recv error: {e}");
                    break;
                }
            }
        }
    }

    fn drain_host(&mut self) {
        let Some(host) = self.host.as_mut() else {
            return;
        };
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        loop {
            match host.io.recv_from(&mut buf) {
                Ok((n, _from)) => host.queue.push_back(buf[..n].to_vec()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("host socket recv error: {e}");
                    break;
                }
            }
        }
    }
}

impl Stage for UdpTransport {
    fn wait_for_packet(&mut self) -> Option<bool> {
        if self.device.is_none() && self.host.is_none() {
            // No wire sockets active at all: let some other stage (or
            // nothing) answer this hook instead of claiming to.
            return None;
        }
        match self.poll.poll(&mut self.events, Some(POLL_TIMEOUT)) {
            Ok(()) => {}
            Err(e) => log::warn!("poll error: {e}"),
        }
        self.drain_device();
        self.drain_host();
        Some(self.device_has_packet() || self.host_has_packet())
    }

    fn device_has_packet(&mut self) -> bool {
        self.drain_device();
        self.device.as_ref().is_some_and(|d| !d.queue.is_empty())
    }

    fn host_has_packet(&mut self) -> bool {
        self.drain_host();
        self.host.as_ref().is_some_and(|h| !h.queue.is_empty())
    }

    fn get_device_packet(&mut self) -> Option<Vec<u8>> {
        self.drain_device();
        self.device.as_mut()?.queue.pop_front()
    }

    fn get_host_packet(&mut self) -> Option<Vec<u8>> {
        self.drain_host();
        self.host.as_mut()?.queue.pop_front()
    }

    fn send_host_packet(&mut self, data: &[u8]) -> Option<()> {
        let host = self.host.as_mut()?;
        if let Err(e) = host.io.send_to(data, host.dest) {
            log::warn!("failed to send to host peer {}: {e}", host.dest);
        }
        Some(())
    }

    fn send_device_packet(&mut self, data: &[u8]) -> Option<()> {
        let device = self.device.as_mut()?;
        match device.peer {
            Some(peer) => {
                if let Err(e) = device.io.send_to(data, peer) {
                    log::warn!("failed to send to device peer {peer}: {e}");
                }
            }
            None => {
                // No peer learned yet: non-fatal, drop and log.
                log::info!(
                    "dropping outbound datagram: the bridge has not sent \
                     us anything yet, so its address is unknown"
                );
            }
        }
        Some(())
    }

    /// The transport owns both directions' framing, so it's the natural
    /// place to run the wire codec: nothing else in the chain has a
    /// byte-level view of what a stage further along hands it.
    fn device_decode(&mut self, data: &[u8]) -> Option<Message> {
        match usbmitm_wire::decode_device(data) {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::warn!("malformed device-side datagram: {e}");
                None
            }
        }
    }

    fn host_decode(&mut self, data: &[u8]) -> Option<Message> {
        match usbmitm_wire::decode_host(data) {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::warn!("malformed host-side datagram: {e}");
                None
            }
        }
    }

    fn device_encode(&mut self, pkt: &Message) -> Option<Vec<u8>> {
        Some(usbmitm_wire::encode_device(pkt))
    }

    fn host_encode(&mut self, pkt: &Message) -> Option<Vec<u8>> {
        Some(usbmitm_wire::encode_host(pkt))
    }
}

#[cfg(test)]
#[path = "tests/transport.rs"]
mod tests;
