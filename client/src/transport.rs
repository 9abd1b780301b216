//! Packet transports the session runs over.
//!
//! Transports are polled from the tick loop; they never call back into the
//! session. Dropping a transport is how listeners are detached.

use crate::error::ClientError;
use log::{debug, error, info, warn};
use mirror_shared::{decode_packet, encode_packet, Packet, SessionId, PROTOCOL_VERSION};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::net::UdpSocket;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The server acknowledged the connection
    Connected { session_id: SessionId },
    Packet(Packet),
    /// The link itself went away
    Disconnected { reason: String },
}

pub trait Transport {
    fn send(&mut self, packet: &Packet) -> Result<(), ClientError>;

    /// Everything received since the previous poll, in arrival order.
    fn poll(&mut self) -> Vec<TransportEvent>;

    fn close(&mut self);
}

#[derive(Debug, Default)]
struct Channel {
    inbound: VecDeque<TransportEvent>,
    outbound: Vec<Packet>,
    closed: bool,
}

/// In-process transport. The matching [`MemoryPeer`] plays the server.
#[derive(Debug)]
pub struct MemoryTransport {
    channel: Rc<RefCell<Channel>>,
}

#[derive(Debug, Clone)]
pub struct MemoryPeer {
    channel: Rc<RefCell<Channel>>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryPeer) {
        let channel = Rc::new(RefCell::new(Channel::default()));
        (
            MemoryTransport {
                channel: Rc::clone(&channel),
            },
            MemoryPeer { channel },
        )
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        let mut channel = self.channel.borrow_mut();
        if channel.closed {
            return Err(ClientError::TransportClosed);
        }
        channel.outbound.push(packet.clone());
        Ok(())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut channel = self.channel.borrow_mut();
        if channel.closed {
            return Vec::new();
        }
        channel.inbound.drain(..).collect()
    }

    fn close(&mut self) {
        self.channel.borrow_mut().closed = true;
    }
}

impl MemoryPeer {
    pub fn connect(&self, session_id: SessionId) {
        self.push(TransportEvent::Connected { session_id });
    }

    pub fn send(&self, packet: Packet) {
        self.push(TransportEvent::Packet(packet));
    }

    pub fn drop_link(&self, reason: &str) {
        self.push(TransportEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    fn push(&self, event: TransportEvent) {
        self.channel.borrow_mut().inbound.push_back(event);
    }

    /// Takes every packet the client sent so far.
    pub fn received(&self) -> Vec<Packet> {
        std::mem::take(&mut self.channel.borrow_mut().outbound)
    }

    pub fn is_closed(&self) -> bool {
        self.channel.borrow().closed
    }
}

const MAX_DATAGRAM: usize = 64 * 1024;

/// UDP transport framing each packet as one bincode datagram.
///
/// The socket is registered with the ambient tokio runtime; `poll` and `send`
/// only use the non-blocking `try_*` calls so they can run from the frame loop.
pub struct UdpTransport {
    socket: UdpSocket,
    server_addr: SocketAddr,
    pending: VecDeque<Vec<u8>>,
    buffer: Vec<u8>,
    closed: bool,
}

impl UdpTransport {
    /// Binds a local socket and sends the connect handshake.
    pub async fn connect(server_addr: &str) -> Result<Self, ClientError> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let bind_addr = if server_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;

        info!("Connecting to {} from {}", server_addr, socket.local_addr()?);
        let hello = encode_packet(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
        })?;
        socket.send_to(&hello, server_addr).await?;

        Ok(Self {
            socket,
            server_addr,
            pending: VecDeque::new(),
            buffer: vec![0u8; MAX_DATAGRAM],
            closed: false,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.socket.local_addr()?)
    }

    /// Waits until a datagram can be read.
    pub async fn readable(&self) -> Result<(), ClientError> {
        Ok(self.socket.readable().await?)
    }

    fn flush(&mut self) -> Result<(), ClientError> {
        while let Some(bytes) = self.pending.front() {
            match self.socket.try_send_to(bytes, self.server_addr) {
                Ok(_) => {
                    self.pending.pop_front();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::TransportClosed);
        }
        self.pending.push_back(encode_packet(packet)?);
        self.flush()
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        if self.closed {
            return events;
        }
        if let Err(e) = self.flush() {
            warn!("UdpTransport: send failed: {}", e);
        }

        loop {
            match self.socket.try_recv_from(&mut self.buffer) {
                Ok((len, from)) => {
                    if from != self.server_addr {
                        debug!("UdpTransport: ignoring datagram from {}", from);
                        continue;
                    }
                    match decode_packet(&self.buffer[..len]) {
                        Ok(Packet::Connected { session_id }) => {
                            events.push(TransportEvent::Connected { session_id })
                        }
                        Ok(packet) => events.push(TransportEvent::Packet(packet)),
                        Err(e) => warn!("UdpTransport: dropping malformed packet: {}", e),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("UdpTransport: receive failed: {}", e);
                    self.closed = true;
                    events.push(TransportEvent::Disconnected { reason: e.to_string() });
                    break;
                }
            }
        }
        events
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Ok(bytes) = encode_packet(&Packet::Disconnect) {
            let _ = self.socket.try_send_to(&bytes, self.server_addr);
        }
        self.closed = true;
    }
}
