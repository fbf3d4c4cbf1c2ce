//! Transport capability set consumed by the tracking wrappers.
//!
//! # Responsibilities
//! - Describe a stream listener as {accept, local address, close}
//! - Describe a connection as an async byte stream with address introspection
//! - Provide impls for tokio TCP and (on unix) Unix-domain sockets
//!
//! # Design Decisions
//! - No concrete transport is assumed by the wrappers
//! - Socket options that only exist for TCP are optional hooks with no-op defaults

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

/// An accepted, stream-oriented connection.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Human-readable description of the remote end.
    fn peer_description(&self) -> String;

    /// Human-readable description of the local end.
    fn local_description(&self) -> String;

    /// Enable keep-alive probing with the given idle period.
    ///
    /// Transports without keep-alive ignore this.
    fn set_keepalive(&self, _period: Duration) -> io::Result<()> {
        Ok(())
    }
}

/// A source of incoming connections.
pub trait Listener: Send + 'static {
    /// Connection type yielded by `accept`.
    type Conn: Connection;
    /// Address type reported for peers and for the local socket.
    type Addr: fmt::Debug + Send + 'static;

    /// Wait for the next incoming connection.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Conn, Self::Addr)>> + Send;

    /// The address this listener is bound to.
    fn local_addr(&self) -> io::Result<Self::Addr>;

    /// Stop listening. Dropping the listener releases the socket.
    fn close(self) -> io::Result<()>
    where
        Self: Sized,
    {
        drop(self);
        Ok(())
    }
}

#[cfg(unix)]
fn describe<T: fmt::Debug>(addr: io::Result<T>) -> String {
    match addr {
        Ok(addr) => format!("{:?}", addr),
        Err(e) => format!("<unknown: {}>", e),
    }
}

impl Connection for tokio::net::TcpStream {
    fn peer_description(&self) -> String {
        match self.peer_addr() {
            Ok(addr) => addr.to_string(),
            Err(e) => format!("<unknown: {}>", e),
        }
    }

    fn local_description(&self) -> String {
        match self.local_addr() {
            Ok(addr) => addr.to_string(),
            Err(e) => format!("<unknown: {}>", e),
        }
    }

    fn set_keepalive(&self, period: Duration) -> io::Result<()> {
        let keepalive = socket2::TcpKeepalive::new().with_time(period);
        socket2::SockRef::from(self).set_tcp_keepalive(&keepalive)
    }
}

impl Listener for tokio::net::TcpListener {
    type Conn = tokio::net::TcpStream;
    type Addr = std::net::SocketAddr;

    async fn accept(&mut self) -> io::Result<(Self::Conn, Self::Addr)> {
        tokio::net::TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        tokio::net::TcpListener::local_addr(self)
    }
}

#[cfg(unix)]
impl Connection for tokio::net::UnixStream {
    fn peer_description(&self) -> String {
        describe(self.peer_addr())
    }

    fn local_description(&self) -> String {
        describe(self.local_addr())
    }
}

#[cfg(unix)]
impl Listener for tokio::net::UnixListener {
    type Conn = tokio::net::UnixStream;
    type Addr = tokio::net::unix::SocketAddr;

    async fn accept(&mut self) -> io::Result<(Self::Conn, Self::Addr)> {
        tokio::net::UnixListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        tokio::net::UnixListener::local_addr(self)
    }
}
