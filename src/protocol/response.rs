use bincode::{Decode, Encode};
use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};

use crate::term::Step;

/// Status codes a server reply can carry.
///
/// Unknown wire values survive decoding as [`StatusCode::Unknown`] so the
/// dispatcher, not the codec, decides they are a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// The query produced no result.
    SuccessEmpty,
    /// The query produced a single JSON document.
    SuccessJson,
    /// A page of a streamed result, with more to come.
    SuccessPartial,
    /// The final page of a streamed result.
    SuccessStream,
    /// The server could not parse the encoded request.
    BrokenClient,
    /// The query was rejected before execution.
    BadQuery,
    /// The query failed while executing.
    RuntimeError,
    /// A status this client does not recognize.
    Unknown(u32),
}

impl StatusCode {
    pub fn code(self) -> u32 {
        match self {
            StatusCode::SuccessEmpty => 0,
            StatusCode::SuccessJson => 1,
            StatusCode::SuccessPartial => 2,
            StatusCode::SuccessStream => 3,
            StatusCode::BrokenClient => 101,
            StatusCode::BadQuery => 102,
            StatusCode::RuntimeError => 103,
            StatusCode::Unknown(code) => code,
        }
    }
}

impl From<u32> for StatusCode {
    fn from(code: u32) -> Self {
        match code {
            0 => StatusCode::SuccessEmpty,
            1 => StatusCode::SuccessJson,
            2 => StatusCode::SuccessPartial,
            3 => StatusCode::SuccessStream,
            101 => StatusCode::BrokenClient,
            102 => StatusCode::BadQuery,
            103 => StatusCode::RuntimeError,
            code => StatusCode::Unknown(code),
        }
    }
}

impl Encode for StatusCode {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.code().encode(encoder)
    }
}

impl<Context> Decode<Context> for StatusCode {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(StatusCode::from(u32::decode(decoder)?))
    }
}

bincode::impl_borrow_decode!(StatusCode);

/// A single server-to-client message.
///
/// `payload` holds zero or more JSON documents in text form; the error
/// fields are meaningful only for error statuses.
#[derive(Debug, Encode, Decode, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub payload: Vec<String>,
    pub error_message: String,
    pub backtrace: Vec<Step>,
}

impl Response {
    pub fn success(status: StatusCode, payload: Vec<String>) -> Self {
        Response {
            status,
            payload,
            error_message: String::new(),
            backtrace: Vec::new(),
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>, backtrace: Vec<Step>) -> Self {
        Response {
            status,
            payload: Vec::new(),
            error_message: message.into(),
            backtrace,
        }
    }
}
