//! UDP broadcast adapter.
//!
//! Implements [`DatagramSink`] over `std::net::UdpSocket`, which is backed
//! by lwIP on ESP-IDF and by the host stack everywhere else, so the same
//! code runs on both.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use log::{info, warn};

use crate::app::ports::DatagramSink;
use crate::error::Error;

pub struct UdpBroadcast {
    socket: UdpSocket,
    destination: SocketAddrV4,
}

impl UdpBroadcast {
    /// Bind an ephemeral local port and target `destination:port`.
    pub fn bind(destination: &str, port: u16) -> Result<Self, Error> {
        let ip: Ipv4Addr = destination.parse().map_err(|_| Error::Connectivity)?;
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).map_err(|e| {
            warn!("UDP: bind failed: {}", e);
            Error::Connectivity
        })?;
        // Subnet-directed broadcasts need SO_BROADCAST too.
        socket.set_broadcast(true).map_err(|_| Error::Connectivity)?;
        socket.set_nonblocking(true).map_err(|_| Error::Connectivity)?;
        let destination = SocketAddrV4::new(ip, port);
        info!("UDP: publishing to {}", destination);
        Ok(Self { socket, destination })
    }

    pub fn destination(&self) -> SocketAddrV4 {
        self.destination
    }
}

impl DatagramSink for UdpBroadcast {
    fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
        match self.socket.send_to(payload, self.destination) {
            Ok(n) if n == payload.len() => Ok(()),
            Ok(n) => {
                warn!("UDP: short send {}/{}B", n, payload.len());
                Err(Error::Connectivity)
            }
            Err(e) => {
                warn!("UDP: send failed: {}", e);
                Err(Error::Connectivity)
            }
        }
    }
}
