pub mod translator;

pub use translator::SqlQuery;
