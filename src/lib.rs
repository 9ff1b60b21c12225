pub mod cli;
pub mod error;
pub mod protocol;
pub mod render;
pub mod term;

pub use error::{Error, QueryError};
pub use protocol::{Connection, Cursor, Reply, connect};
pub use term::{MetaQuery, Query, Step, Term, WriteQuery};
