//! Shared fixtures for the query tests
//!
//! The same seven animals are available as typed structs, as JSON documents,
//! and as a column/path registry for the translators.

#![allow(dead_code)]

use std::cmp::Ordering;

use chrono::NaiveDate;
use pubquery::query::parse_datetime;
use pubquery::{FieldRegistry, FieldType, JsonPath, ObjectListQuery, Value};
use regex::Regex;
use serde_json::{json, Value as JsonValue};

#[derive(Debug, Clone, PartialEq)]
pub struct Animal {
    pub name: &'static str,
    pub caught: NaiveDate,
    pub legs: u32,
    pub arms: Option<u32>,
    pub flys: bool,
    pub height: f64,
}

fn animal(
    name: &'static str,
    (y, m, d): (i32, u32, u32),
    legs: u32,
    arms: Option<u32>,
    flys: bool,
    height: f64,
) -> Animal {
    Animal {
        name,
        caught: NaiveDate::from_ymd_opt(y, m, d).expect("valid date"),
        legs,
        arms,
        flys,
        height,
    }
}

pub fn animals() -> Vec<Animal> {
    vec![
        animal("zebra", (2010, 3, 15), 4, None, false, 1.4),
        animal("monkey", (2002, 4, 11), 2, Some(2), false, 1.2),
        animal("duck", (1987, 11, 3), 2, None, true, 0.15),
        animal("whale", (1910, 1, 15), 2, None, false, 2.1),
        animal("millipede", (1950, 7, 21), 1000, None, false, 0.005),
        animal("lobster", (1978, 6, 8), 6, Some(2), false, 0.1),
        animal("spider", (1988, 7, 1), 8, None, false, 0.005),
    ]
}

pub fn animal_fields() -> FieldRegistry<pubquery::BoxedAccessor<Animal>> {
    FieldRegistry::builder()
        .attribute("name", "nm", FieldType::String, |a: &Animal| Some(Value::from(a.name)))
        .attribute("caught", "cg", FieldType::DateTime, |a: &Animal| Some(Value::from(a.caught)))
        .attribute("legs", "lg", FieldType::Int, |a: &Animal| Some(Value::from(a.legs)))
        .attribute("arms", "ar", FieldType::Int, |a: &Animal| a.arms.map(Value::from))
        .attribute("flys", "fy", FieldType::Bool, |a: &Animal| Some(Value::from(a.flys)))
        .attribute("height", "hg", FieldType::Float, |a: &Animal| Some(Value::from(a.height)))
        .build()
        .expect("valid registry")
}

/// Query engine seeded with every animal.
pub fn animal_query() -> ObjectListQuery<Animal> {
    let mut query = ObjectListQuery::new(animal_fields());
    query.add_objects(animals()).expect("animals index cleanly");
    query
}

/// Names of the animals matching `q`, in addition order.
pub fn names(query: &ObjectListQuery<Animal>, q: &str) -> Vec<&'static str> {
    query
        .query(q)
        .unwrap_or_else(|e| panic!("query {:?} failed: {}", q, e))
        .into_iter()
        .map(|a| a.name)
        .collect()
}

/// The animals as stored documents, with nested appendages and string dates.
pub fn animal_documents() -> Vec<JsonValue> {
    animals()
        .into_iter()
        .map(|a| {
            let mut appendages = json!({ "legs": a.legs });
            if let Some(arms) = a.arms {
                appendages["arms"] = json!(arms);
            }
            json!({
                "name": a.name,
                "caught": a.caught.format("%Y-%m-%d").to_string(),
                "appendages": appendages,
                "flys": a.flys,
                "size": { "height": a.height },
            })
        })
        .collect()
}

pub fn document_fields() -> FieldRegistry<pubquery::BoxedAccessor<JsonValue>> {
    FieldRegistry::builder()
        .path("name", "nm", FieldType::String, "name")
        .path("caught", "cg", FieldType::DateTime, "caught")
        .path("legs", "lg", FieldType::Int, "appendages.legs")
        .path("arms", "ar", FieldType::Int, "appendages.arms")
        .path("flys", "fy", FieldType::Bool, "flys")
        .path("height", "hg", FieldType::Float, "size.height")
        .build()
        .expect("valid registry")
}

/// Column names for the SQL translator.
pub fn column_fields() -> FieldRegistry<String> {
    FieldRegistry::builder()
        .field("name", "nm", FieldType::String, "name")
        .field("legs", "lg", FieldType::Int, "legs")
        .build()
        .expect("valid registry")
}

/// Dot paths for the document translator.
pub fn path_fields() -> FieldRegistry<String> {
    FieldRegistry::builder()
        .field("name", "nm", FieldType::String, "name")
        .field("legs", "lg", FieldType::Int, "appendages.legs")
        .field("caught", "cg", FieldType::DateTime, "caught")
        .build()
        .expect("valid registry")
}

/// Dot paths matching `document_fields`, for rendering filters.
pub fn document_paths() -> FieldRegistry<String> {
    FieldRegistry::builder()
        .field("name", "nm", FieldType::String, "name")
        .field("caught", "cg", FieldType::DateTime, "caught")
        .field("legs", "lg", FieldType::Int, "appendages.legs")
        .field("arms", "ar", FieldType::Int, "appendages.arms")
        .field("flys", "fy", FieldType::Bool, "flys")
        .field("height", "hg", FieldType::Float, "size.height")
        .build()
        .expect("valid registry")
}

// ==================== Filter matching ====================

/// Evaluate a rendered filter document against one stored document, the way
/// a document store would for the operators the translator emits.
pub fn matches_filter(doc: &JsonValue, filter: &JsonValue) -> bool {
    let Some(clauses) = filter.as_object() else {
        panic!("filter must be an object: {}", filter);
    };
    clauses.iter().all(|(key, value)| match key.as_str() {
        "$and" => sub_filters(value).iter().all(|f| matches_filter(doc, f)),
        "$or" => sub_filters(value).iter().any(|f| matches_filter(doc, f)),
        "$nor" => !sub_filters(value).iter().any(|f| matches_filter(doc, f)),
        path => matches_field(JsonPath::new(path).lookup(doc), value),
    })
}

fn sub_filters(value: &JsonValue) -> &Vec<JsonValue> {
    value.as_array().expect("logical operator takes an array")
}

fn matches_field(field: Option<&JsonValue>, predicate: &JsonValue) -> bool {
    let Some(ops) = predicate.as_object() else {
        panic!("field predicate must be an object: {}", predicate);
    };
    // A missing field fails every operator.
    let Some(field) = field else {
        return false;
    };
    ops.iter().all(|(op, operand)| match op.as_str() {
        "$eq" => compare(field, operand) == Some(Ordering::Equal),
        "$gt" => compare(field, operand) == Some(Ordering::Greater),
        "$lt" => compare(field, operand) == Some(Ordering::Less),
        "$regex" => {
            let re = Regex::new(operand.as_str().expect("regex source")).expect("valid regex");
            field.as_str().is_some_and(|s| re.is_match(s))
        }
        "$all" => match (field.as_array(), operand.as_array()) {
            (Some(items), Some(wanted)) => wanted.iter().all(|w| items.contains(w)),
            _ => false,
        },
        "$size" => field.as_array().map(|items| items.len() as u64) == operand.as_u64(),
        other => panic!("unexpected operator {}", other),
    })
}

/// Typed comparison; values of different types are incomparable.
fn compare(field: &JsonValue, operand: &JsonValue) -> Option<Ordering> {
    match operand {
        JsonValue::Object(date) => {
            let wanted = parse_datetime(date.get("$date")?.as_str()?)?;
            let have = parse_datetime(field.as_str()?)?;
            Some(have.cmp(&wanted))
        }
        JsonValue::Number(n) => field.as_f64()?.partial_cmp(&n.as_f64()?),
        JsonValue::String(s) => field.as_str().map(|f| f.cmp(s.as_str())),
        JsonValue::Bool(b) => field.as_bool().map(|f| f.cmp(b)),
        _ => None,
    }
}

/// Names of the documents a rendered filter selects, in document order.
pub fn filtered_names(docs: &[JsonValue], filter: &JsonValue) -> Vec<String> {
    docs.iter()
        .filter(|doc| matches_filter(doc, filter))
        .map(|doc| doc["name"].as_str().expect("named document").to_string())
        .collect()
}
