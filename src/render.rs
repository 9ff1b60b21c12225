//! Error-location rendering.
//!
//! When the server reports an error it names the failing sub-expression as
//! a backtrace: a path of [`Step`]s from the root of the submitted query.
//! [`locate`] re-renders the query with the node at that path bracketed by
//! two sentinel markers, then [`underline`] converts the bracketed region
//! into a row of carets beneath the offending text.
use thiserror::Error;

use crate::term::{Query, Step, Term, Wrap, WriteQuery};

const BEGIN_MARK: &str = "\0begin\0";
const END_MARK: &str = "\0end\0";

/// The point at which highlighting stops descending into branches that
/// left the path to the target.
const COLLAPSE_DEPTH: usize = 2;
/// Renderings longer than this collapse to `"..."` off the target path.
const COLLAPSE_WIDTH: usize = 60;
/// Renderings shorter than this are kept verbatim even when collapsing.
const KEEP_WIDTH: usize = 8;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(
        "backtrace does not address a unique node: \
         {begins} begin and {ends} end markers in rendering"
    )]
    LostTarget { begins: usize, ends: usize },

    #[error("location rendering is not supported for meta queries")]
    MetaQuery,
}

/// Rendering capability handed to query nodes.
///
/// Each method renders one child, annotated with the steps that lead from
/// the parent node to that child.
pub trait Printer {
    /// Renders an expression, wrapping a bare literal in `expr(...)`.
    fn expr_wrapped(&self, term: &Term, steps: &[Step]) -> String;
    /// Renders an expression exactly as it reads in argument position.
    fn expr_unwrapped(&self, term: &Term, steps: &[Step]) -> String;
    /// Renders a write query.
    fn write_query(&self, query: &WriteQuery, steps: &[Step]) -> String;
    /// Renders an atom that carries its own step annotation.
    fn simple_string(&self, text: &str, steps: &[Step]) -> String;
}

/// Renders a query with no annotations.
pub struct PlainPrinter;

impl Printer for PlainPrinter {
    fn expr_wrapped(&self, term: &Term, _steps: &[Step]) -> String {
        let (text, wrap) = term.pretty(self);
        match wrap {
            Wrap::Unwrapped => format!("expr({text})"),
            Wrap::Wrapped => text,
        }
    }

    fn expr_unwrapped(&self, term: &Term, _steps: &[Step]) -> String {
        term.pretty(self).0
    }

    fn write_query(&self, query: &WriteQuery, _steps: &[Step]) -> String {
        query.pretty(self)
    }

    fn simple_string(&self, text: &str, _steps: &[Step]) -> String {
        text.to_string()
    }
}

/// Renders a query with the node at `target` bracketed by the sentinel
/// markers, collapsing branches far from the target so the output stays
/// bounded regardless of query depth.
pub struct Highlighter {
    current: Vec<Step>,
    target: Vec<Step>,
}

impl Highlighter {
    pub fn new(target: Vec<Step>) -> Self {
        Highlighter {
            current: Vec::new(),
            target,
        }
    }

    fn descend(&self, steps: &[Step]) -> Highlighter {
        let mut current = self.current.clone();
        current.extend(steps.iter().cloned());
        Highlighter {
            current,
            target: self.target.clone(),
        }
    }

    /// Decides how the rendering of the node at `current ++ steps` appears
    /// in the final text: bracketed when it is the target, verbatim when it
    /// is on the path to the target, and collapsed to `"..."` once it is
    /// more than [`COLLAPSE_DEPTH`] levels off that path or longer than
    /// [`COLLAPSE_WIDTH`] characters.
    fn consider(&self, text: String, steps: &[Step]) -> String {
        let mut combined = self.current.clone();
        combined.extend(steps.iter().cloned());

        if combined == self.target {
            return format!("{BEGIN_MARK}{text}{END_MARK}");
        }

        let shared = combined
            .iter()
            .zip(self.target.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let width = text.chars().count();

        if shared == combined.len() {
            // An ancestor of the target: keep it whole so descent continues.
            text
        } else if shared == self.target.len() {
            // Inside the bracketed region.
            if combined.len() > self.target.len() + COLLAPSE_DEPTH || width > COLLAPSE_WIDTH {
                collapse(text, width)
            } else {
                text
            }
        } else {
            // A branch that diverged from the path to the target.
            if combined.len() > shared + COLLAPSE_DEPTH || width > COLLAPSE_WIDTH {
                collapse(text, width)
            } else {
                text
            }
        }
    }
}

fn collapse(text: String, width: usize) -> String {
    if width > KEEP_WIDTH {
        "...".to_string()
    } else {
        text
    }
}

impl Printer for Highlighter {
    fn expr_wrapped(&self, term: &Term, steps: &[Step]) -> String {
        let (text, wrap) = term.pretty(&self.descend(steps));
        let text = match wrap {
            Wrap::Unwrapped => format!("expr({text})"),
            Wrap::Wrapped => text,
        };
        self.consider(text, steps)
    }

    fn expr_unwrapped(&self, term: &Term, steps: &[Step]) -> String {
        let (text, _) = term.pretty(&self.descend(steps));
        self.consider(text, steps)
    }

    fn write_query(&self, query: &WriteQuery, steps: &[Step]) -> String {
        let text = query.pretty(&self.descend(steps));
        self.consider(text, steps)
    }

    fn simple_string(&self, text: &str, steps: &[Step]) -> String {
        self.consider(text.to_string(), steps)
    }
}

/// Renders `query` with carets under the sub-expression at `target`.
pub fn locate(query: &Query, target: &[Step]) -> Result<String, RenderError> {
    let printer = Highlighter::new(target.to_vec());
    let rendered = match query {
        Query::Read(term) => printer.expr_wrapped(term, &[]),
        Query::Write(write) => printer.write_query(write, &[]),
        Query::Meta(_) => return Err(RenderError::MetaQuery),
    };
    underline(&rendered)
}

/// Strips the sentinel markers out of `rendered` and draws a row of carets
/// under the text they bracketed.
///
/// Exactly one begin and one end marker must occur; anything else means
/// the backtrace failed to address a unique node.
pub fn underline(rendered: &str) -> Result<String, RenderError> {
    let begins = rendered.matches(BEGIN_MARK).count();
    let ends = rendered.matches(END_MARK).count();
    if begins != 1 || ends != 1 {
        return Err(RenderError::LostTarget { begins, ends });
    }

    let mut lines = Vec::new();
    let mut in_target = false;
    for line in rendered.split('\n') {
        let line = line.trim_end_matches(' ');
        if !in_target {
            if let Some((before, rest)) = line.split_once(BEGIN_MARK) {
                let pad = " ".repeat(before.chars().count());
                if let Some((target, after)) = rest.split_once(END_MARK) {
                    lines.push(format!("{before}{target}{after}"));
                    lines.push(format!("{pad}{}", carets(target)));
                } else {
                    lines.push(format!("{before}{rest}"));
                    lines.push(format!("{pad}{}", carets(rest)));
                    in_target = true;
                }
            } else {
                lines.push(line.to_string());
            }
        } else {
            let stripped = line.trim_start_matches(' ');
            let pad = " ".repeat(line.chars().count() - stripped.chars().count());
            if let Some((before, after)) = stripped.split_once(END_MARK) {
                lines.push(format!("{pad}{before}{after}"));
                lines.push(format!("{pad}{}", carets(before)));
                in_target = false;
            } else {
                lines.push(format!("{pad}{stripped}"));
                lines.push(format!("{pad}{}", carets(stripped)));
            }
        }
    }
    Ok(lines.join("\n"))
}

fn carets(text: &str) -> String {
    "^".repeat(text.chars().count())
}
