use std::fmt;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};

use log::{debug, info};
use serde_json::Value;

use crate::error::{Error, QueryError};
use crate::term::Query;

use super::cursor::Cursor;
use super::request::Request;
use super::response::StatusCode;
use super::transport::{ProtocolTransport, TransportError, wire_config};

/// The session state behind a connection: the transport and the token
/// counter. Cursors reach back into it through a weak handle.
pub(crate) struct Session<T: Read + Write> {
    transport: ProtocolTransport<T>,
    next_token: u64,
}

impl<T: Read + Write> Session<T> {
    fn take_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    /// One blocking request/response round trip, dispatched on the
    /// response status. Success statuses yield the parsed payload items;
    /// everything else is an error carrying the original query for
    /// location rendering.
    pub(crate) fn exchange(
        &mut self,
        request: &Request,
        query: &Query,
    ) -> Result<(Vec<Value>, StatusCode), Error> {
        debug!("sending request: token={}", request.token);
        self.transport.send_request(request)?;
        let response = self.transport.recv_response()?;
        debug!(
            "received response: status={:?}, items={}",
            response.status,
            response.payload.len()
        );

        match response.status {
            StatusCode::SuccessJson => {
                let raw = response.payload.first().ok_or_else(|| {
                    Error::Protocol("SUCCESS_JSON response carried no payload".into())
                })?;
                Ok((vec![parse_item(raw)?], StatusCode::SuccessJson))
            }
            StatusCode::SuccessPartial | StatusCode::SuccessStream => {
                let items = response
                    .payload
                    .iter()
                    .map(|raw| parse_item(raw))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((items, response.status))
            }
            StatusCode::SuccessEmpty => Ok((Vec::new(), StatusCode::SuccessEmpty)),
            StatusCode::RuntimeError => Err(Error::Execution(QueryError::new(
                response.error_message,
                response.backtrace,
                query.clone(),
            ))),
            StatusCode::BadQuery => Err(Error::BadQuery(QueryError::new(
                response.error_message,
                response.backtrace,
                query.clone(),
            ))),
            StatusCode::BrokenClient => Err(Error::Protocol(
                "server rejected the encoded request as malformed".into(),
            )),
            StatusCode::Unknown(code) => {
                Err(Error::Protocol(format!("unexpected status code {code}")))
            }
        }
    }
}

fn parse_item(raw: &str) -> Result<Value, Error> {
    serde_json::from_str(raw)
        .map_err(|err| Error::Protocol(format!("malformed payload item: {err}")))
}

/// Outcome of running a query.
pub enum Reply<T: Read + Write = TcpStream> {
    /// A single JSON document.
    Value(Value),
    /// A paged stream of JSON documents.
    Rows(Cursor<T>),
    /// The query produced no result.
    Empty,
}

impl<T: Read + Write> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Reply::Rows(rows) => f.debug_tuple("Rows").field(rows).finish(),
            Reply::Empty => write!(f, "Empty"),
        }
    }
}

/// A blocking connection to the server.
///
/// Queries are evaluated one at a time; each call completes its full
/// round trip before returning. There is no timeout mechanism here; set
/// one on the underlying stream if needed.
pub struct Connection<T: Read + Write = TcpStream> {
    session: Arc<Mutex<Session<T>>>,
}

impl Connection<TcpStream> {
    /// Connects over TCP and performs the protocol handshake.
    pub fn open(addr: impl ToSocketAddrs) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr).map_err(TransportError::Io)?;
        if let Ok(peer) = stream.peer_addr() {
            info!("connected to {peer}");
        }
        Self::from_stream(stream)
    }
}

impl<T: Read + Write> Connection<T> {
    /// Wraps an established byte stream and performs the handshake.
    pub fn from_stream(stream: T) -> Result<Self, Error> {
        let mut transport = ProtocolTransport::new(stream);
        transport.handshake()?;
        Ok(Connection {
            session: Arc::new(Mutex::new(Session {
                transport,
                next_token: 1,
            })),
        })
    }

    /// Evaluates `query` on the server.
    ///
    /// Returns a single value, an empty reply, or a [`Cursor`] when the
    /// server streams the result in pages.
    pub fn run(&mut self, query: &Query) -> Result<Reply<T>, Error> {
        let body = bincode::encode_to_vec(query, wire_config()).map_err(TransportError::Serialize)?;

        let mut session = self.session.lock().unwrap();
        let token = session.take_token();
        let (items, status) = session.exchange(&Request::start(token, body), query)?;
        drop(session);

        match status {
            StatusCode::SuccessJson => match items.into_iter().next() {
                Some(value) => Ok(Reply::Value(value)),
                None => Err(Error::Protocol(
                    "SUCCESS_JSON response carried no payload".into(),
                )),
            },
            StatusCode::SuccessPartial | StatusCode::SuccessStream => Ok(Reply::Rows(Cursor::new(
                Arc::downgrade(&self.session),
                token,
                query.clone(),
                items,
                status == StatusCode::SuccessStream,
            ))),
            StatusCode::SuccessEmpty => Ok(Reply::Empty),
            other => Err(Error::Protocol(format!(
                "unexpected status code {}",
                other.code()
            ))),
        }
    }

    /// Closes the connection. Cursors still holding a handle fail with
    /// [`Error::ConnectionClosed`] on their next fetch.
    pub fn close(self) {}
}

/// Shorthand for [`Connection::open`].
pub fn connect(addr: impl ToSocketAddrs) -> Result<Connection<TcpStream>, Error> {
    Connection::open(addr)
}

#[cfg(test)]
mod tests {
    use std::io;

    use serde_json::json;

    use super::*;
    use crate::protocol::response::Response;
    use crate::term::{Step, Term};

    struct ScriptedStream {
        input: io::Cursor<Vec<u8>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn connect_scripted(
        responses: &[Response],
    ) -> (Connection<ScriptedStream>, Arc<Mutex<Vec<u8>>>) {
        let mut input = Vec::new();
        for response in responses {
            let body = bincode::encode_to_vec(response, wire_config()).unwrap();
            input.extend((body.len() as u32).to_le_bytes());
            input.extend(body);
        }

        let written = Arc::new(Mutex::new(Vec::new()));
        let stream = ScriptedStream {
            input: io::Cursor::new(input),
            written: Arc::clone(&written),
        };
        (Connection::from_stream(stream).unwrap(), written)
    }

    // Decodes the requests written so far, skipping the 4 handshake bytes.
    fn written_requests(bytes: &[u8]) -> Vec<Request> {
        let mut requests = Vec::new();
        let mut rest = &bytes[4..];
        while !rest.is_empty() {
            let length = u32::from_le_bytes(rest[..4].try_into().unwrap()) as usize;
            let (request, _) =
                bincode::decode_from_slice(&rest[4..4 + length], wire_config()).unwrap();
            requests.push(request);
            rest = &rest[4 + length..];
        }
        requests
    }

    fn query() -> Query {
        Query::Read(Term::json("1"))
    }

    #[test]
    fn handshake_precedes_requests() {
        let (_, written) = connect_scripted(&[]);
        assert_eq!(*written.lock().unwrap(), vec![0x35, 0xba, 0x61, 0xaf]);
    }

    #[test]
    fn tokens_start_at_one_and_increase() {
        let empty = || Response::success(StatusCode::SuccessEmpty, Vec::new());
        let (mut conn, written) = connect_scripted(&[empty(), empty(), empty()]);

        for _ in 0..3 {
            conn.run(&query()).unwrap();
        }

        let tokens: Vec<u64> = written_requests(&written.lock().unwrap())
            .iter()
            .map(|request| request.token)
            .collect();
        assert_eq!(tokens, vec![1, 2, 3]);
    }

    #[test]
    fn single_json_reply() {
        let (mut conn, _) = connect_scripted(&[Response::success(
            StatusCode::SuccessJson,
            vec!["{\"a\": 1}".into()],
        )]);

        match conn.run(&query()).unwrap() {
            Reply::Value(value) => assert_eq!(value, json!({"a": 1})),
            other => panic!("expected a value, got {other:?}"),
        }
    }

    #[test]
    fn empty_reply() {
        let (mut conn, _) =
            connect_scripted(&[Response::success(StatusCode::SuccessEmpty, Vec::new())]);
        assert!(matches!(conn.run(&query()).unwrap(), Reply::Empty));
    }

    #[test]
    fn json_reply_without_payload_is_a_protocol_error() {
        let (mut conn, _) =
            connect_scripted(&[Response::success(StatusCode::SuccessJson, Vec::new())]);
        assert!(matches!(conn.run(&query()), Err(Error::Protocol(_))));
    }

    #[test]
    fn runtime_error_carries_location() {
        let (mut conn, _) = connect_scripted(&[Response::failure(
            StatusCode::RuntimeError,
            "expected a predicate",
            vec![Step::Pos(1)],
        )]);

        let query = Query::Read(Term::call(
            "filter",
            vec![Term::var("table"), Term::var("row")],
        ));
        match conn.run(&query) {
            Err(Error::Execution(err)) => {
                assert_eq!(err.message, "expected a predicate");
                assert_eq!(
                    err.location().unwrap(),
                    "filter(table, row)\n              ^^^"
                );
            }
            other => panic!("expected an execution error, got {other:?}"),
        }
    }

    #[test]
    fn bad_query_error() {
        let (mut conn, _) = connect_scripted(&[Response::failure(
            StatusCode::BadQuery,
            "unknown operation",
            Vec::new(),
        )]);

        match conn.run(&query()) {
            Err(Error::BadQuery(err)) => assert_eq!(err.message, "unknown operation"),
            other => panic!("expected a bad-query error, got {other:?}"),
        }
    }

    #[test]
    fn broken_client_is_fatal() {
        let (mut conn, _) = connect_scripted(&[Response::failure(
            StatusCode::BrokenClient,
            String::new(),
            Vec::new(),
        )]);

        match conn.run(&query()) {
            Err(Error::Protocol(message)) => assert!(message.contains("rejected")),
            other => panic!("expected a protocol error, got {other:?}"),
        }
    }

    #[test]
    fn unrecognized_status_is_fatal() {
        let (mut conn, _) = connect_scripted(&[Response {
            status: StatusCode::Unknown(57),
            payload: Vec::new(),
            error_message: String::new(),
            backtrace: Vec::new(),
        }]);

        match conn.run(&query()) {
            Err(Error::Protocol(message)) => assert!(message.contains("57")),
            other => panic!("expected a protocol error, got {other:?}"),
        }
    }

    #[test]
    fn paged_stream_drains_in_order() {
        let (mut conn, written) = connect_scripted(&[
            Response::success(StatusCode::SuccessPartial, vec!["1".into(), "2".into()]),
            Response::success(StatusCode::SuccessStream, vec!["3".into()]),
        ]);

        let Reply::Rows(mut rows) = conn.run(&query()).unwrap() else {
            panic!("expected rows");
        };
        assert!(!rows.is_complete());
        assert_eq!(rows.fetched(), 2);

        assert_eq!(rows.to_vec().unwrap(), vec![json!(1), json!(2), json!(3)]);
        assert!(rows.is_complete());

        let requests = written_requests(&written.lock().unwrap());
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1], Request::continuation(1));
    }

    #[test]
    fn second_traversal_reuses_cached_pages() {
        let (mut conn, written) = connect_scripted(&[
            Response::success(StatusCode::SuccessPartial, vec!["1".into()]),
            Response::success(StatusCode::SuccessStream, vec!["2".into()]),
        ]);

        let Reply::Rows(mut rows) = conn.run(&query()).unwrap() else {
            panic!("expected rows");
        };
        let first: Vec<_> = rows.iter().map(Result::unwrap).collect();
        let requests_after_drain = written_requests(&written.lock().unwrap()).len();

        let second: Vec<_> = rows.iter().map(Result::unwrap).collect();
        assert_eq!(first, second);
        assert_eq!(
            written_requests(&written.lock().unwrap()).len(),
            requests_after_drain
        );
    }

    #[test]
    fn negative_index_forces_full_drain() {
        let (mut conn, _) = connect_scripted(&[
            Response::success(StatusCode::SuccessPartial, vec!["1".into(), "2".into()]),
            Response::success(StatusCode::SuccessStream, vec!["3".into()]),
        ]);

        let Reply::Rows(mut rows) = conn.run(&query()).unwrap() else {
            panic!("expected rows");
        };
        assert_eq!(rows.get(-1).unwrap(), json!(3));
        assert!(rows.is_complete());
    }

    #[test]
    fn matches_drains_only_as_far_as_needed() {
        let (mut conn, written) = connect_scripted(&[Response::success(
            StatusCode::SuccessPartial,
            vec!["1".into(), "2".into()],
        )]);

        let Reply::Rows(mut rows) = conn.run(&query()).unwrap() else {
            panic!("expected rows");
        };
        // Two items already refute a one-item expectation without another
        // round trip, even though the stream is still open.
        assert!(!rows.matches(&[json!(1)]).unwrap());
        assert_eq!(written_requests(&written.lock().unwrap()).len(), 1);
    }

    #[test]
    fn closed_connection_fails_cursor_fetch() {
        let (mut conn, _) = connect_scripted(&[Response::success(
            StatusCode::SuccessPartial,
            vec!["1".into()],
        )]);

        let Reply::Rows(mut rows) = conn.run(&query()).unwrap() else {
            panic!("expected rows");
        };
        conn.close();

        assert!(matches!(rows.fetch_more(), Err(Error::ConnectionClosed)));
        assert_eq!(rows.get(0).unwrap(), json!(1));
    }
}
