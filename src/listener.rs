// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::net::SocketAddr;
use std::net::TcpListener as StdTcpListener;
use std::net::UdpSocket as StdUdpSocket;
use tokio::net::TcpListener as AsyncTcpListener;
use tokio::net::UdpSocket as AsyncUdpSocket;

/// Represents a TCP socket that is both bound and configured for listening. This supports
/// both async and non-async (std) methods of binding the socket, allowing for these to
/// be constructed outside a tokio runtime if need be (e.g. during early init).
///
/// Because it is a bit confusing when comparing these terms to the Berkeley socket model, creating
/// a Listener calls both:
///  1) bind()
///  2) listen()
/// Therefore, it is ready to accept() connections after success here.
//
pub struct Listener {
    inner: ListenerInner,
}

enum ListenerInner {
    Async(AsyncTcpListener),
    Std(StdTcpListener),
}

impl Listener {
    pub fn listen_std(endpoint: SocketAddr) -> Result<Self, Box<dyn Error + Send + Sync>> {
        match StdTcpListener::bind(endpoint) {
            Ok(l) => Ok(Self {
                inner: ListenerInner::Std(l),
            }),
            Err(e) => Err(format!("unable to bind to {}: {}", endpoint, e).into()),
        }
    }

    pub async fn listen_async(endpoint: SocketAddr) -> Result<Self, Box<dyn Error + Send + Sync>> {
        match AsyncTcpListener::bind(endpoint).await {
            Ok(l) => Ok(Self {
                inner: ListenerInner::Async(l),
            }),
            Err(e) => Err(format!("unable to bind to {}: {}", endpoint, e).into()),
        }
    }

    pub fn bound_address(&self) -> Result<SocketAddr, Box<dyn Error + Send + Sync>> {
        Ok(match &self.inner {
            ListenerInner::Async(inner) => inner.local_addr()?,
            ListenerInner::Std(inner) => inner.local_addr()?,
        })
    }

    pub fn into_async(self) -> Result<AsyncTcpListener, Box<dyn Error + Send + Sync>> {
        match self.inner {
            ListenerInner::Async(inner) => Ok(inner),
            ListenerInner::Std(inner) => {
                // We convert this to async by setting non-blocking
                inner.set_nonblocking(true)?;

                let listener = AsyncTcpListener::from_std(inner)?;
                Ok(listener)
            }
        }
    }
}

/// UDP counterpart of [`Listener`]: a bound datagram socket that can be created
/// with std before the runtime starts and converted to async later.
pub struct DatagramSocket {
    inner: DatagramSocketInner,
}

enum DatagramSocketInner {
    Async(AsyncUdpSocket),
    Std(StdUdpSocket),
}

impl DatagramSocket {
    pub fn bind_std(endpoint: SocketAddr) -> Result<Self, Box<dyn Error + Send + Sync>> {
        match StdUdpSocket::bind(endpoint) {
            Ok(s) => Ok(Self {
                inner: DatagramSocketInner::Std(s),
            }),
            Err(e) => Err(format!("unable to bind to {}: {}", endpoint, e).into()),
        }
    }

    pub async fn bind_async(endpoint: SocketAddr) -> Result<Self, Box<dyn Error + Send + Sync>> {
        match AsyncUdpSocket::bind(endpoint).await {
            Ok(s) => Ok(Self {
                inner: DatagramSocketInner::Async(s),
            }),
            Err(e) => Err(format!("unable to bind to {}: {}", endpoint, e).into()),
        }
    }

    pub fn bound_address(&self) -> Result<SocketAddr, Box<dyn Error + Send + Sync>> {
        Ok(match &self.inner {
            DatagramSocketInner::Async(inner) => inner.local_addr()?,
            DatagramSocketInner::Std(inner) => inner.local_addr()?,
        })
    }

    pub fn into_async(self) -> Result<AsyncUdpSocket, Box<dyn Error + Send + Sync>> {
        match self.inner {
            DatagramSocketInner::Async(inner) => Ok(inner),
            DatagramSocketInner::Std(inner) => {
                inner.set_nonblocking(true)?;

                let socket = AsyncUdpSocket::from_std(inner)?;
                Ok(socket)
            }
        }
    }
}
