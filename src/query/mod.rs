pub mod ast;
pub mod lexer;
pub mod operand;
pub mod parser;

pub use ast::*;
pub use operand::{parse_datetime, parse_operand, OperandError};
pub use parser::{parse, MAX_NESTING_DEPTH};

use crate::error::QueryResult;

/// A backend interprets a parsed [`Expression`]: by evaluating it over
/// indexed objects or by rendering it for an external store.
///
/// Backends never re-parse; the grammar lives only in [`parser`].
pub trait QueryBackend {
    type Output;

    fn translate(&self, expression: &Expression) -> QueryResult<Self::Output>;
}
