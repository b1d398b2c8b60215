//! PubMed-style field queries over in-memory objects, SQL tables and
//! document stores.
//!
//! A query such as `>2[legs] and (*er[nm] or >1990-01-01[caught])` is parsed
//! against a [`FieldRegistry`] into an [`Expression`], which one of the
//! backends then evaluates or renders:
//!
//! - [`ObjectListQuery`] answers it from covering indexes over added objects,
//! - [`SqlQuery`] renders a `SELECT ... WHERE` statement,
//! - [`DocumentQuery`] renders a MongoDB-style filter document.

pub mod config;
pub mod document;
pub mod error;
pub mod field;
pub mod objects;
pub mod query;
pub mod sql;

pub use config::{AccessorFailurePolicy, DateEncoding, IdentifierKind, QueryConfig};
pub use document::DocumentQuery;
pub use error::{AccessorError, QueryError, QueryResult};
pub use field::{BoxedAccessor, Field, FieldAccessor, FieldRegistry, FieldType, JsonPath, Value};
pub use objects::{AddReport, ObjectId, ObjectListQuery};
pub use query::{parse, Expression, QueryBackend};
pub use sql::SqlQuery;
