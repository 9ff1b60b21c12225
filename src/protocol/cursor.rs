use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Mutex, Weak};

use serde_json::Value;

use crate::error::Error;
use crate::term::Query;

use super::connection::Session;
use super::request::Request;
use super::response::StatusCode;

/// A result stream that lazily fetches pages from the server.
///
/// Items accumulate in arrival order and are never dropped, so repeated
/// traversals re-use what earlier fetches brought in. Once the stream is
/// complete no further requests are issued. The cursor does not own the
/// connection; if the connection is closed first, the next fetch fails
/// with [`Error::ConnectionClosed`].
pub struct Cursor<T: Read + Write = TcpStream> {
    session: Weak<Mutex<Session<T>>>,
    token: u64,
    query: Query,
    items: Vec<Value>,
    complete: bool,
}

impl<T: Read + Write> Cursor<T> {
    pub(crate) fn new(
        session: Weak<Mutex<Session<T>>>,
        token: u64,
        query: Query,
        items: Vec<Value>,
        complete: bool,
    ) -> Self {
        Cursor {
            session,
            token,
            query,
            items,
            complete,
        }
    }

    /// Whether the server has sent the final page.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// How many items have arrived so far.
    pub fn fetched(&self) -> usize {
        self.items.len()
    }

    /// Fetches one more page. A no-op once the stream is complete; on
    /// failure the cursor is left exactly as it was.
    pub fn fetch_more(&mut self) -> Result<(), Error> {
        if self.complete {
            return Ok(());
        }

        let session = self.session.upgrade().ok_or(Error::ConnectionClosed)?;
        let (items, status) = session
            .lock()
            .unwrap()
            .exchange(&Request::continuation(self.token), &self.query)?;

        if status == StatusCode::SuccessStream {
            self.complete = true;
        }
        self.items.extend(items);
        Ok(())
    }

    /// Fetches pages until `index` is available or the stream completes;
    /// `None` drains the stream entirely.
    pub fn fetch_until(&mut self, index: Option<usize>) -> Result<(), Error> {
        match index {
            None => {
                while !self.complete {
                    self.fetch_more()?;
                }
            }
            Some(index) => {
                while !self.complete && index >= self.items.len() {
                    self.fetch_more()?;
                }
            }
        }
        Ok(())
    }

    /// Random access by index. A negative index counts from the end and
    /// forces a full drain, since the end is unknown until completion.
    pub fn get(&mut self, index: isize) -> Result<Value, Error> {
        if index < 0 {
            self.fetch_until(None)?;
            let back = index.unsigned_abs();
            if back > self.items.len() {
                return Err(Error::OutOfRange {
                    index,
                    len: self.items.len(),
                });
            }
            Ok(self.items[self.items.len() - back].clone())
        } else {
            self.fetch_until(Some(index as usize))?;
            self.items
                .get(index as usize)
                .cloned()
                .ok_or(Error::OutOfRange {
                    index,
                    len: self.items.len(),
                })
        }
    }

    /// Compares the stream against a finite sequence, fetching only as
    /// far as needed to confirm or refute. A stream that has not
    /// completed by the comparison target's length is unequal.
    pub fn matches(&mut self, expected: &[Value]) -> Result<bool, Error> {
        self.fetch_until(Some(expected.len()))?;
        Ok(self.complete && self.items == expected)
    }

    /// Drains the stream and returns every item.
    pub fn to_vec(&mut self) -> Result<Vec<Value>, Error> {
        self.fetch_until(None)?;
        Ok(self.items.clone())
    }

    /// Iterates items in arrival order, fetching pages on demand. A fresh
    /// call starts again from the first item without re-fetching anything
    /// already held.
    pub fn iter(&mut self) -> Iter<'_, T> {
        Iter {
            cursor: self,
            index: 0,
        }
    }
}

impl<T: Read + Write> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("token", &self.token)
            .field("fetched", &self.items.len())
            .field("complete", &self.complete)
            .finish()
    }
}

pub struct Iter<'a, T: Read + Write> {
    cursor: &'a mut Cursor<T>,
    index: usize,
}

impl<T: Read + Write> Iterator for Iter<'_, T> {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(err) = self.cursor.fetch_until(Some(self.index)) {
            return Some(Err(err));
        }
        let item = self.cursor.items.get(self.index).cloned()?;
        self.index += 1;
        Some(Ok(item))
    }
}
