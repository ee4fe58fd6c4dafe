// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message transport over a connected byte stream.
//!
//! # Architecture
//!
//! ```text
//! +------------------------------------------------------+
//! |                     Connection                       |
//! |  state machine, xref piggybacking, ok handshake      |
//! +------------------------------------------------------+
//! |                     FrameCodec                       |
//! |  [len u32 BE][kind u32 BE][body]                     |
//! +------------------------------------------------------+
//! |                     ByteStream                       |
//! |  TcpStream, Box<dyn ByteStream>, test doubles        |
//! +------------------------------------------------------+
//! ```
//!
//! Connecting and accepting are left to the caller:
//!
//! ```no_run
//! use objstream::transport::Connection;
//! use objstream::SchemaContext;
//! use std::net::TcpStream;
//! use std::sync::Arc;
//!
//! let ctx = Arc::new(SchemaContext::default());
//! let stream = TcpStream::connect("127.0.0.1:9090")?;
//! let mut conn = Connection::new(stream, ctx)?;
//! let msg = conn.receive()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod byte_stream;
pub mod connection;
pub mod frame_codec;

pub use byte_stream::{BoxedByteStream, ByteStream};
pub use connection::{Connection, ConnectionState, ConnectionStats};
pub use frame_codec::FrameCodec;
