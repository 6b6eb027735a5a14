//! Thin datagram transport used by the resolver.
//!
//! The resolver only talks to name servers through the [`Transport`] and
//! [`Connector`] traits, so tests substitute scripted servers for the UDP
//! implementation. No retry and no higher-level policy lives here; the
//! resolver owns those.

#[cfg(feature = "logging")]
use crate::log::trace;
use crate::dns_parser::MAX_MSG_SIZE;
use crate::{e_fmt, Error, Result};
use std::{
    net::{Ipv4Addr, SocketAddrV4, UdpSocket},
    time::Duration,
};

/// Receive timeout on the datagram socket, so a dead or silent peer
/// cannot hang the walk.
pub(crate) const RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// One connected datagram channel to a name server.
pub trait Transport {
    /// Transmits one datagram atomically. Buffers longer than
    /// [`MAX_MSG_SIZE`] are rejected without transmission.
    fn send(&mut self, buffer: &[u8]) -> Result<()>;

    /// Reads one datagram, up to [`MAX_MSG_SIZE`] octets, returning
    /// exactly the bytes received.
    fn receive(&mut self) -> Result<Vec<u8>>;
}

/// Opens a [`Transport`] to a name server address.
pub trait Connector {
    fn connect(&self, address: Ipv4Addr, port: u16) -> Result<Box<dyn Transport>>;
}

/// The production connector: connected UDP sockets with a read timeout.
pub struct UdpConnector {
    timeout: Duration,
}

impl UdpConnector {
    pub fn new() -> Self {
        Self {
            timeout: RECEIVE_TIMEOUT,
        }
    }
}

impl Default for UdpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for UdpConnector {
    fn connect(&self, address: Ipv4Addr, port: u16) -> Result<Box<dyn Transport>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .map_err(|e| e_fmt!("failed to bind udp socket: {}", e))?;
        socket
            .connect(SocketAddrV4::new(address, port))
            .map_err(|e| e_fmt!("failed to connect to {}:{}: {}", address, port, e))?;
        socket
            .set_read_timeout(Some(self.timeout))
            .map_err(|e| e_fmt!("failed to set read timeout: {}", e))?;
        trace!("connected to {}:{}", address, port);
        Ok(Box::new(UdpTransport { socket }))
    }
}

/// A connected UDP socket. The socket is released when the transport is
/// dropped.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl Transport for UdpTransport {
    fn send(&mut self, buffer: &[u8]) -> Result<()> {
        if buffer.len() > MAX_MSG_SIZE {
            return Err(Error::MessageTooLong(buffer.len()));
        }
        self.socket
            .send(buffer)
            .map_err(|e| e_fmt!("udp send failed: {}", e))?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; MAX_MSG_SIZE];
        let count = self
            .socket
            .recv(&mut buffer)
            .map_err(|e| e_fmt!("udp receive failed: {}", e))?;
        buffer.truncate(count);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_rejects_oversized_buffer() {
        let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = peer.local_addr().unwrap().port();

        let mut transport = UdpConnector::new()
            .connect(Ipv4Addr::LOCALHOST, port)
            .unwrap();
        let oversized = vec![0u8; MAX_MSG_SIZE + 1];
        assert_eq!(
            transport.send(&oversized),
            Err(Error::MessageTooLong(MAX_MSG_SIZE + 1))
        );
    }

    #[test]
    fn test_loopback_exchange() {
        let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = peer.local_addr().unwrap().port();

        let mut transport = UdpConnector::new()
            .connect(Ipv4Addr::LOCALHOST, port)
            .unwrap();
        transport.send(b"query").unwrap();

        let mut buffer = [0u8; 16];
        let (count, from) = peer.recv_from(&mut buffer).unwrap();
        assert_eq!(&buffer[..count], b"query");

        peer.send_to(b"reply", from).unwrap();
        assert_eq!(transport.receive().unwrap(), b"reply");
    }

    #[test]
    fn test_receive_times_out() {
        let peer = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = peer.local_addr().unwrap().port();

        let connector = UdpConnector {
            timeout: Duration::from_millis(50),
        };
        let mut transport = connector.connect(Ipv4Addr::LOCALHOST, port).unwrap();
        assert!(transport.receive().is_err());
    }
}
