use thiserror::Error;

use crate::protocol::TransportError;
use crate::render::{self, RenderError};
use crate::term::{Query, Step};

/// Details of a query the server rejected or failed to evaluate.
///
/// The backtrace names the failing sub-expression; [`location`] renders it
/// inside the full query text with a caret underline. Rendering walks the
/// expression tree, so it happens on demand rather than at construction.
///
/// [`location`]: QueryError::location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub message: String,
    pub backtrace: Vec<Step>,
    pub query: Query,
}

impl QueryError {
    pub(crate) fn new(message: String, backtrace: Vec<Step>, query: Query) -> Self {
        QueryError {
            message,
            backtrace,
            query,
        }
    }

    /// Renders the query with carets under the failing sub-expression.
    pub fn location(&self) -> Result<String, RenderError> {
        render::locate(&self.query, &self.backtrace)
    }
}

/// List of possible errors the driver can surface.
///
/// None of these are retried internally; every failure propagates to the
/// caller of `run` or of a cursor operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The server rejected the query as invalid before executing it.
    #[error("illegal query: {}", .0.message)]
    BadQuery(QueryError),

    /// The server hit a runtime fault while evaluating the query.
    #[error("error while executing query on server: {}", .0.message)]
    Execution(QueryError),

    /// Framing or socket failure underneath the protocol.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client and server have desynchronized; not recoverable.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A cursor tried to fetch through a connection that was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// A backtrace could not be rendered back onto the query.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Random access past the end of a completed result stream.
    #[error("index {index} out of range for {len} results")]
    OutOfRange { index: isize, len: usize },
}
