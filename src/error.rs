use thiserror::Error;

/// Why an accessor could not produce a value for one field of one object.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessorError {
    #[error("value is missing")]
    Missing,

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Field {0} not recognised")]
    UnknownField(String),

    #[error("Field {field}: {operand} {message}")]
    OperandType {
        field: String,
        operand: String,
        message: String,
    },

    #[error("Field {field} cannot be queried through the {backend} backend: {reason}")]
    UnsupportedCondition {
        backend: &'static str,
        field: String,
        reason: String,
    },

    #[error("Field name '{0}' is registered more than once")]
    DuplicateField(String),

    #[error("Accessor for field {field} failed on object '{id}': {source}")]
    Accessor {
        field: String,
        id: String,
        #[source]
        source: AccessorError,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

impl QueryError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        QueryError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn operand(
        field: impl Into<String>,
        operand: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        QueryError::OperandType {
            field: field.into(),
            operand: operand.into(),
            message: message.into(),
        }
    }
}

impl serde::Serialize for QueryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<toml::de::Error> for QueryError {
    fn from(err: toml::de::Error) -> Self {
        QueryError::Config(err.to_string())
    }
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        QueryError::Config(err.to_string())
    }
}
