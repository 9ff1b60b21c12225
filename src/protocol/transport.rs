use std::io::{self, Read, Write};

use bincode::config::{Configuration, Fixint, LittleEndian};
use thiserror::Error;

use super::{Request, Response};

/// Magic value written immediately after connect; the server sends no
/// reply to it.
pub const HANDSHAKE_MAGIC: u32 = 0xaf61_ba35;

/// Frames larger than this are rejected before allocation.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode message: {0}")]
    Serialize(#[from] bincode::error::EncodeError),
    #[error("failed to decode message: {0}")]
    Deserialize(#[from] bincode::error::DecodeError),
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    Oversized(u64),
}

pub(crate) fn wire_config() -> Configuration<LittleEndian, Fixint> {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

/// Length-prefixed message framing over a blocking byte stream.
///
/// Every frame is a `u32` little-endian length followed by that many bytes
/// of encoded message. Reads block until the exact count arrives; an end
/// of stream before that is a fatal transport error.
pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
    config: Configuration<LittleEndian, Fixint>,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            config: wire_config(),
        }
    }

    /// Identifies the protocol to the server. Must be the first bytes on
    /// the wire after connect.
    pub fn handshake(&mut self) -> Result<(), TransportError> {
        self.stream.write_all(&HANDSHAKE_MAGIC.to_le_bytes())?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn send_request(&mut self, request: &Request) -> Result<(), TransportError> {
        let body = bincode::encode_to_vec(request, self.config)?;
        if body.len() > MAX_FRAME_SIZE as usize {
            return Err(TransportError::Oversized(body.len() as u64));
        }
        self.stream.write_all(&(body.len() as u32).to_le_bytes())?;
        self.stream.write_all(&body)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn recv_response(&mut self) -> Result<Response, TransportError> {
        let frame = self.recv_frame()?;
        let (response, _) = bincode::decode_from_slice(&frame, self.config)?;
        Ok(response)
    }

    fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header)?;
        let length = u32::from_le_bytes(header);
        if length > MAX_FRAME_SIZE {
            return Err(TransportError::Oversized(u64::from(length)));
        }

        let mut frame = vec![0u8; length as usize];
        self.stream.read_exact(&mut frame)?;
        Ok(frame)
    }
}
