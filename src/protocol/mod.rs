//! Client-server communication protocol.
//!
//! This module implements the wire protocol spoken to the server and the
//! machinery built on top of it: message framing, the blocking session
//! that carries one request/response round trip at a time, and the cursor
//! that pages through results too large for a single reply.
//!
//! # Overview
//!
//! A connection opens a TCP stream, sends the 4-byte protocol handshake,
//! and then exchanges length-prefixed messages. Each query is assigned a
//! token, a correlation id that is unique and increasing for the life of
//! the connection. A query whose result streams in pages re-uses its
//! token for every continuation request.
//!
//! # Key Components
//!
//! - [`Connection`]: owns the session; evaluates queries and dispatches
//!   response status codes into values, cursors, or errors.
//! - [`Cursor`]: a lazily-fetching view over a paged result stream.
//! - [`ProtocolTransport`]: length-prefixed framing over any blocking
//!   byte stream.
//! - [`Request`] / [`Response`]: the two message shapes on the wire.
//!
//! # Binary Format
//!
//! All integers are little-endian. Every message is framed as a `u32`
//! payload length followed by the payload, encoded with a fixed-width
//! integer encoding. The handshake magic is sent raw, with no frame and
//! no reply.
//!
//! # See Also
//!
//! - [`term`](crate::term): the expression trees submitted through this
//!   protocol.
//! - [`render`](crate::render): turns server-reported error backtraces
//!   into caret-annotated query text.
mod connection;
mod cursor;
mod request;
mod response;
mod transport;

pub use connection::{Connection, Reply, connect};
pub use cursor::{Cursor, Iter};
pub use request::{Request, RequestKind};
pub use response::{Response, StatusCode};
pub use transport::{HANDSHAKE_MAGIC, MAX_FRAME_SIZE, ProtocolTransport, TransportError};
