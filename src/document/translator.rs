use chrono::{NaiveDateTime, SecondsFormat};
use serde_json::{json, Map, Value as JsonValue};

use crate::config::{DateEncoding, DocumentConfig};
use crate::error::{QueryError, QueryResult};
use crate::field::{FieldRegistry, FieldType};
use crate::query::{
    parse, Comparator, Condition, Expression, MembershipMode, Operand, QueryBackend, Scalar,
    TextPattern,
};

/// Renders queries as MongoDB-style filter documents.
///
/// Each registered field's accessor is the dot path of the attribute in the
/// stored document, e.g. `appendages.legs`.
pub struct DocumentQuery {
    fields: FieldRegistry<String>,
    config: DocumentConfig,
}

impl DocumentQuery {
    pub fn new(fields: FieldRegistry<String>) -> Self {
        Self::with_config(fields, DocumentConfig::default())
    }

    pub fn with_config(fields: FieldRegistry<String>, config: DocumentConfig) -> Self {
        Self { fields, config }
    }

    pub fn fields(&self) -> &FieldRegistry<String> {
        &self.fields
    }

    /// Filter document for `query`. A blank query is the empty filter `{}`,
    /// which matches every document.
    pub fn query(&self, query: &str) -> QueryResult<JsonValue> {
        if query.trim().is_empty() {
            return Ok(JsonValue::Object(Map::new()));
        }
        let expression = parse(query, &self.fields)?;
        let filter = self.translate(&expression)?;
        tracing::debug!(query, filter = %filter, "translated query to document filter");
        Ok(filter)
    }

    fn translate_expr(&self, expr: &Expression) -> QueryResult<JsonValue> {
        match expr {
            // $nor also matches documents where the field is absent, which
            // agrees with NOT as a complement of the whole collection.
            Expression::Not(inner) => Ok(json!({ "$nor": [self.translate_expr(inner)?] })),
            Expression::And(left, right) => Ok(json!({
                "$and": [self.translate_expr(left)?, self.translate_expr(right)?]
            })),
            Expression::Or(left, right) => Ok(json!({
                "$or": [self.translate_expr(left)?, self.translate_expr(right)?]
            })),
            Expression::Condition(condition) => self.translate_condition(condition),
        }
    }

    fn translate_condition(&self, condition: &Condition) -> QueryResult<JsonValue> {
        let field = self
            .fields
            .get(condition.field.index)
            .ok_or_else(|| QueryError::UnknownField(condition.field.name.clone()))?;

        let predicate = match &condition.operand {
            Operand::Text(TextPattern::Exact(s)) => json!({ "$eq": s }),
            Operand::Text(pattern) => json!({ "$regex": pattern.to_regex() }),
            Operand::Compare { comparator, value } => {
                let value = match value {
                    Scalar::Number(n) => number(field.field_type, *n),
                    Scalar::DateTime(dt) => self.date(dt),
                };
                json!({ operator(*comparator): value })
            }
            Operand::Flag(b) => json!({ "$eq": b }),
            Operand::Members { mode, values } => match mode {
                MembershipMode::Contains => json!({ "$all": values }),
                MembershipMode::Exact => {
                    let mut distinct = values.clone();
                    distinct.sort();
                    distinct.dedup();
                    json!({ "$all": distinct, "$size": distinct.len() })
                }
            },
        };

        let mut filter = Map::new();
        filter.insert(field.accessor.clone(), predicate);
        Ok(JsonValue::Object(filter))
    }

    fn date(&self, dt: &NaiveDateTime) -> JsonValue {
        let text = dt.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true);
        match self.config.dates {
            DateEncoding::ExtendedJson => json!({ "$date": text }),
            DateEncoding::String => JsonValue::String(text),
        }
    }
}

impl QueryBackend for DocumentQuery {
    type Output = JsonValue;

    fn translate(&self, expression: &Expression) -> QueryResult<JsonValue> {
        self.translate_expr(expression)
    }
}

fn operator(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::GreaterThan => "$gt",
        Comparator::LessThan => "$lt",
        Comparator::Equal => "$eq",
    }
}

/// Integral operands on int fields stay JSON integers.
fn number(field_type: FieldType, n: f64) -> JsonValue {
    if field_type == FieldType::Int && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}
