pub mod translator;

pub use translator::DocumentQuery;
