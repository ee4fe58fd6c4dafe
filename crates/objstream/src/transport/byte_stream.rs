// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ByteStream trait: the "connected byte stream" a [`Connection`] runs over.
//!
//! Connection setup (connect, accept, TLS, auth) happens elsewhere; this
//! module only needs a blocking, ordered, reliable stream of bytes.
//!
//! # Example
//!
//! ```ignore
//! use objstream::transport::ByteStream;
//!
//! fn send_raw<S: ByteStream>(stream: &mut S, frame: &[u8]) -> std::io::Result<()> {
//!     stream.write_all(frame)?;
//!     stream.flush()
//! }
//! ```
//!
//! [`Connection`]: super::Connection

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

/// What a [`Connection`](super::Connection) needs from its stream.
///
/// `read` must block until data arrives and return `Ok(0)` only at end of
/// stream. The connection forces blocking mode and asks for no-delay on
/// construction, and shuts the stream down when it closes.
pub trait ByteStream: Read + Write + Send {
    /// Shut down the read, write, or both halves.
    fn shutdown(&mut self, how: Shutdown) -> io::Result<()>;

    /// Remote address, for logging and [`Connection::peer_addr`](super::Connection::peer_addr).
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    /// Disable write coalescing (TCP_NODELAY). Best effort.
    fn set_nodelay(&self, nodelay: bool) -> io::Result<()>;
}

// ============================================================================
// TcpStream implementation
// ============================================================================

impl ByteStream for TcpStream {
    fn shutdown(&mut self, how: Shutdown) -> io::Result<()> {
        TcpStream::shutdown(self, how)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        TcpStream::set_nodelay(self, nodelay)
    }

}

// ============================================================================
// Boxed stream
// ============================================================================

/// Type-erased stream for connections whose stream type is chosen at runtime.
pub type BoxedByteStream = Box<dyn ByteStream>;

impl ByteStream for BoxedByteStream {
    fn shutdown(&mut self, how: Shutdown) -> io::Result<()> {
        (**self).shutdown(how)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        (**self).peer_addr()
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }

    fn set_nodelay(&self, nodelay: bool) -> io::Result<()> {
        (**self).set_nodelay(nodelay)
    }

}

// ============================================================================
// Mock stream (tests)
// ============================================================================


#[cfg(test)]
mod tests {
    use super::mock::MockStream;
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_trait_is_object_safe() {
        let (a, _b) = MockStream::pair();
        let boxed: BoxedByteStream = Box::new(a);
        assert_eq!(boxed.peer_addr().unwrap().port(), 10002);
        boxed.set_nodelay(true).unwrap();
        boxed.set_nonblocking(false).unwrap();
    }

    #[test]
    fn test_pair_is_duplex() {
        let (mut a, mut b) = MockStream::pair();
        a.write_all(b"ping").unwrap();
        b.write_all(b"pong").unwrap();

        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        a.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
        assert_eq!(a.write_calls(), 1);
    }

    #[test]
    fn test_read_blocks_until_data() {
        let (mut a, mut b) = MockStream::pair();
        let reader = thread::spawn(move || {
            let mut buf = [0u8; 2];
            b.read_exact(&mut buf).map(|_| buf)
        });
        thread::sleep(Duration::from_millis(20));
        a.write_all(b"ok").unwrap();
        assert_eq!(&reader.join().unwrap().unwrap(), b"ok");
    }

    #[test]
    fn test_disconnect_drains_then_eof() {
        let (mut a, mut b) = MockStream::pair();
        a.write_all(b"abc").unwrap();
        a.disconnect();

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), 3);
        assert_eq!(b.read(&mut buf).unwrap(), 0);
        assert_eq!(
            b.write(b"x").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }

    #[test]
    fn test_error_injection_is_one_shot() {
        let (mut a, mut b) = MockStream::pair();
        b.inject_read_error(io::ErrorKind::ConnectionReset);
        let mut buf = [0u8; 1];
        assert_eq!(
            b.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::ConnectionReset
        );
        a.write_all(b"z").unwrap();
        assert_eq!(b.read(&mut buf).unwrap(), 1);

        a.inject_write_error(io::ErrorKind::BrokenPipe);
        assert!(a.write(b"q").is_err());
        assert!(a.write(b"q").is_ok());
    }
}
