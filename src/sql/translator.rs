use crate::config::SqlConfig;
use crate::error::{QueryError, QueryResult};
use crate::field::FieldRegistry;
use crate::query::{parse, Condition, Expression, Operand, QueryBackend, Scalar};

/// Renders queries as a `SELECT * FROM <table> WHERE <predicate>` statement.
///
/// Each registered field's accessor is its column name. Every AND/OR is
/// parenthesised and every NOT wraps its operand, so the statement's
/// precedence is exactly the parsed tree's.
pub struct SqlQuery {
    fields: FieldRegistry<String>,
    config: SqlConfig,
}

impl SqlQuery {
    pub fn new(fields: FieldRegistry<String>) -> Self {
        Self::with_config(fields, SqlConfig::default())
    }

    pub fn with_config(fields: FieldRegistry<String>, config: SqlConfig) -> Self {
        Self { fields, config }
    }

    pub fn fields(&self) -> &FieldRegistry<String> {
        &self.fields
    }

    /// Full statement. A blank query selects the whole table.
    pub fn query(&self, query: &str, table: &str) -> QueryResult<String> {
        if query.trim().is_empty() {
            return Ok(format!("SELECT * FROM {}", table));
        }
        let predicate = self.where_clause(query)?;
        Ok(format!("SELECT * FROM {} WHERE {}", table, predicate))
    }

    /// Predicate only.
    pub fn where_clause(&self, query: &str) -> QueryResult<String> {
        let expression = parse(query, &self.fields)?;
        let sql = self.translate(&expression)?;
        tracing::debug!(query, sql = %sql, "translated query to SQL");
        Ok(sql)
    }

    fn translate_expr(&self, expr: &Expression) -> QueryResult<String> {
        match expr {
            Expression::Not(inner) => Ok(format!("NOT ({})", self.translate_expr(inner)?)),
            Expression::And(left, right) => Ok(format!(
                "({} AND {})",
                self.translate_expr(left)?,
                self.translate_expr(right)?
            )),
            Expression::Or(left, right) => Ok(format!(
                "({} OR {})",
                self.translate_expr(left)?,
                self.translate_expr(right)?
            )),
            Expression::Condition(condition) => self.translate_condition(condition),
        }
    }

    fn translate_condition(&self, condition: &Condition) -> QueryResult<String> {
        let column = self
            .fields
            .get(condition.field.index)
            .map(|field| quote_identifier(&field.accessor))
            .ok_or_else(|| QueryError::UnknownField(condition.field.name.clone()))?;

        match &condition.operand {
            Operand::Text(pattern) => {
                Ok(format!("{} LIKE {}", column, quote_literal(&pattern.to_like())))
            }
            Operand::Compare { comparator, value } => match value {
                Scalar::Number(n) => Ok(format!("{} {} {}", column, comparator.symbol(), n)),
                Scalar::DateTime(dt) => {
                    // Both sides as UNIX seconds, independent of the stored format.
                    let cast = self.config.datetime_cast.replace("{column}", &column);
                    Ok(format!(
                        "{} {} {}",
                        cast,
                        comparator.symbol(),
                        dt.and_utc().timestamp()
                    ))
                }
            },
            Operand::Flag(b) => Ok(format!("{} = {}", column, u8::from(*b))),
            Operand::Members { .. } => Err(QueryError::UnsupportedCondition {
                backend: "sql",
                field: condition.field.name.clone(),
                reason: "list membership has no single-column predicate".to_string(),
            }),
        }
    }
}

impl QueryBackend for SqlQuery {
    type Output = String;

    fn translate(&self, expression: &Expression) -> QueryResult<String> {
        self.translate_expr(expression)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
