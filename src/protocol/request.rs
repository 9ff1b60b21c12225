use bincode::{Decode, Encode};

/// What a request asks the server to do with its token.
#[derive(Debug, Encode, Decode, PartialEq, Eq)]
pub enum RequestKind {
    /// Submit a new query; `body` is the encoded [`Query`](crate::Query).
    Start { body: Vec<u8> },
    /// Ask for the next page of results of an earlier query.
    Continue,
}

/// A single client-to-server message.
///
/// Immutable once built; the token correlates the response (and any
/// continuation pages) with the query that produced it.
#[derive(Debug, Encode, Decode, PartialEq, Eq)]
pub struct Request {
    pub token: u64,
    pub kind: RequestKind,
}

impl Request {
    pub fn start(token: u64, body: Vec<u8>) -> Self {
        Request {
            token,
            kind: RequestKind::Start { body },
        }
    }

    pub fn continuation(token: u64) -> Self {
        Request {
            token,
            kind: RequestKind::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_carries_body() {
        let request = Request::start(7, vec![1, 2, 3]);
        assert_eq!(request.token, 7);
        assert_eq!(request.kind, RequestKind::Start { body: vec![1, 2, 3] });
    }

    #[test]
    fn continuation_request_carries_no_body() {
        let request = Request::continuation(7);
        assert_eq!(request.token, 7);
        assert_eq!(request.kind, RequestKind::Continue);
    }
}
