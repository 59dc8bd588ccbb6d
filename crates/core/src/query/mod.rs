//! Source-selector language used by the bundled query evaluator.
//!
//! ```text
//! ""                      every note
//! "Books"                 notes under the Books folder
//! #novel                  notes tagged novel (or novel/…)
//! [[Projects/Alpha]]      notes whose fields or body link to Projects/Alpha
//! [[]]                    notes linking to the note the query runs for
//! "Books" and -#draft     combinators: and, or, -negation, parentheses
//! ```

pub mod eval;
pub mod parser;

use thiserror::Error;

pub use eval::{QueryNote, select};
pub use parser::{Query, parse};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unexpected end of query")]
    UnexpectedEnd,

    #[error("unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("unterminated {0} starting at position {1}")]
    Unterminated(&'static str, usize),
}
