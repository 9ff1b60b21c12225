//! Query expressions submitted to the server.
//!
//! A query is one of three closed variants: a read expression over
//! [`Term`]s, a [`WriteQuery`] that mutates a table, or a [`MetaQuery`]
//! that manages tables themselves. Terms form a tree; the server reports
//! error positions as a [`Step`] path into that tree, which is why every
//! child carries a stable step annotation when rendered.
//!
//! Rendering goes through the [`Printer`](crate::render::Printer)
//! capability so the same tree walk serves both plain display and
//! error-location highlighting.
use bincode::{Decode, Encode};
use std::fmt;

use crate::render::{PlainPrinter, Printer};

/// One step of a backtrace path into a query tree.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Step {
    /// The k-th positional child of a node, 0-based.
    Pos(usize),
    /// A named field of a node.
    Opt(String),
}

/// Whether a rendering already reads as a query expression or as a bare
/// JSON literal that needs an `expr(...)` wrapper at top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    Wrapped,
    Unwrapped,
}

/// A node of a read expression.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Term {
    /// A JSON literal, kept as its source text.
    Json(String),
    /// A reference to a bound variable, e.g. the row inside a filter.
    Var(String),
    /// A whole-table scan.
    Table(String),
    /// A named operation applied to positional arguments.
    Call { name: String, args: Vec<Term> },
    /// A conditional with named branches.
    If {
        test: Box<Term>,
        then: Box<Term>,
        orelse: Box<Term>,
    },
}

impl Term {
    pub fn json(text: impl Into<String>) -> Self {
        Term::Json(text.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(name.into())
    }

    pub fn table(name: impl Into<String>) -> Self {
        Term::Table(name.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Call {
            name: name.into(),
            args,
        }
    }

    /// Renders this node with `printer`, annotating each child with the
    /// step that leads to it.
    pub fn pretty(&self, printer: &dyn Printer) -> (String, Wrap) {
        match self {
            Term::Json(text) => (text.clone(), Wrap::Unwrapped),
            Term::Var(name) => (name.clone(), Wrap::Wrapped),
            Term::Table(name) => (format!("table({name:?})"), Wrap::Wrapped),
            Term::Call { name, args } => {
                let args = args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| printer.expr_unwrapped(arg, &[Step::Pos(i)]))
                    .collect::<Vec<_>>()
                    .join(", ");
                (format!("{name}({args})"), Wrap::Wrapped)
            }
            Term::If { test, then, orelse } => {
                let text = format!(
                    "if({}, {}, {})",
                    printer.expr_unwrapped(test, &[Step::Opt("test".into())]),
                    printer.expr_unwrapped(then, &[Step::Opt("true".into())]),
                    printer.expr_unwrapped(orelse, &[Step::Opt("false".into())]),
                );
                (text, Wrap::Wrapped)
            }
        }
    }
}

/// A query that mutates rows of a table.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum WriteQuery {
    Insert { table: String, docs: Vec<Term> },
    Update { target: Term, body: Term },
    Delete { target: Term },
}

impl WriteQuery {
    pub fn pretty(&self, printer: &dyn Printer) -> String {
        match self {
            WriteQuery::Insert { table, docs } => {
                let docs = docs
                    .iter()
                    .enumerate()
                    .map(|(i, doc)| printer.expr_unwrapped(doc, &[Step::Pos(i)]))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "insert({}, [{docs}])",
                    printer.simple_string(table, &[Step::Opt("table_ref".into())]),
                )
            }
            WriteQuery::Update { target, body } => format!(
                "update({}, {})",
                printer.expr_wrapped(target, &[Step::Opt("view".into())]),
                printer.expr_unwrapped(body, &[Step::Opt("mapping".into())]),
            ),
            WriteQuery::Delete { target } => format!(
                "delete({})",
                printer.expr_wrapped(target, &[Step::Opt("view".into())]),
            ),
        }
    }
}

/// A query that manages tables rather than rows.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum MetaQuery {
    CreateTable(String),
    DropTable(String),
    ListTables,
}

impl fmt::Display for MetaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaQuery::CreateTable(name) => write!(f, "create_table({name:?})"),
            MetaQuery::DropTable(name) => write!(f, "drop_table({name:?})"),
            MetaQuery::ListTables => write!(f, "list_tables()"),
        }
    }
}

/// A complete query as submitted to the server.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Query {
    Read(Term),
    Write(WriteQuery),
    Meta(MetaQuery),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Read(term) => write!(f, "{}", PlainPrinter.expr_wrapped(term, &[])),
            Query::Write(write) => write!(f, "{}", PlainPrinter.write_query(write, &[])),
            Query::Meta(meta) => write!(f, "{meta}"),
        }
    }
}
