//! Covering indexes: per field, observed value -> slots of the objects
//! holding it.
//!
//! Lookups touch only matching keys (or, for suffix/substring/glob patterns,
//! the distinct keys), never the full object list.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::field::{FieldType, Value};
use crate::query::{Comparator, MembershipMode, Operand, Scalar, TextPattern};

/// Position of an object in addition order.
pub type Slot = usize;

/// Ordered set of slots; iteration order is addition order.
pub type SlotSet = BTreeSet<Slot>;

/// `f64` with a total order, so numbers can key a `BTreeMap`.
#[derive(Debug, Clone, Copy)]
pub struct NumberKey(f64);

impl NumberKey {
    pub fn new(n: f64) -> Self {
        // -0.0 and 0.0 must land in the same bucket.
        Self(if n == 0.0 { 0.0 } else { n })
    }
}

impl PartialEq for NumberKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NumberKey {}

impl PartialOrd for NumberKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NumberKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A lookup the index cannot answer.
#[derive(Error, Debug)]
pub enum LookupError {
    /// The operand was built for a field of another type, e.g. an expression
    /// parsed against a different registry.
    #[error("a {operand} operand cannot be looked up in a {index} index")]
    Mismatch {
        operand: &'static str,
        index: &'static str,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

fn operand_kind(operand: &Operand) -> &'static str {
    match operand {
        Operand::Text(_) => "text",
        Operand::Compare {
            value: Scalar::Number(_),
            ..
        } => "number comparison",
        Operand::Compare {
            value: Scalar::DateTime(_),
            ..
        } => "datetime comparison",
        Operand::Flag(_) => "bool",
        Operand::Members { .. } => "membership",
    }
}

#[derive(Debug)]
pub enum FieldIndex {
    Text(BTreeMap<String, SlotSet>),
    Number(BTreeMap<NumberKey, SlotSet>),
    DateTime(BTreeMap<NaiveDateTime, SlotSet>),
    Flag(BTreeMap<bool, SlotSet>),
    Members {
        elements: BTreeMap<String, SlotSet>,
        /// List length per slot, for exact-set matches.
        sizes: HashMap<Slot, usize>,
    },
}

fn union_of<'a>(buckets: impl Iterator<Item = &'a SlotSet>) -> SlotSet {
    buckets.flatten().copied().collect()
}

fn compare_range<K: Ord>(map: &BTreeMap<K, SlotSet>, comparator: Comparator, key: &K) -> SlotSet {
    match comparator {
        Comparator::Equal => map.get(key).cloned().unwrap_or_default(),
        Comparator::GreaterThan => {
            union_of(map.range((Bound::Excluded(key), Bound::Unbounded)).map(|(_, s)| s))
        }
        Comparator::LessThan => {
            union_of(map.range((Bound::Unbounded, Bound::Excluded(key))).map(|(_, s)| s))
        }
    }
}

impl FieldIndex {
    pub fn for_type(field_type: FieldType) -> Self {
        match field_type {
            FieldType::String => FieldIndex::Text(BTreeMap::new()),
            FieldType::Int | FieldType::Float => FieldIndex::Number(BTreeMap::new()),
            FieldType::DateTime => FieldIndex::DateTime(BTreeMap::new()),
            FieldType::Bool => FieldIndex::Flag(BTreeMap::new()),
            FieldType::List => FieldIndex::Members {
                elements: BTreeMap::new(),
                sizes: HashMap::new(),
            },
        }
    }

    /// Add `slot` under `value`. The value must already be coerced to the
    /// field's declared type.
    pub fn insert(&mut self, slot: Slot, value: Value) {
        match (self, value) {
            (FieldIndex::Text(map), Value::Text(s)) => {
                map.entry(s).or_default().insert(slot);
            }
            (FieldIndex::Number(map), Value::Number(n)) => {
                map.entry(NumberKey::new(n)).or_default().insert(slot);
            }
            (FieldIndex::DateTime(map), Value::DateTime(dt)) => {
                map.entry(dt).or_default().insert(slot);
            }
            (FieldIndex::Flag(map), Value::Bool(b)) => {
                map.entry(b).or_default().insert(slot);
            }
            (FieldIndex::Members { elements, sizes }, Value::List(items)) => {
                // Raw length, so `!a` does not match `[a, a]`, as with `$size`.
                sizes.insert(slot, items.len());
                for item in items {
                    elements.entry(item).or_default().insert(slot);
                }
            }
            (_, value) => {
                tracing::warn!(?value, "value does not match index type, not indexed");
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FieldIndex::Text(_) => "text",
            FieldIndex::Number(_) => "number",
            FieldIndex::DateTime(_) => "datetime",
            FieldIndex::Flag(_) => "bool",
            FieldIndex::Members { .. } => "list",
        }
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        match self {
            FieldIndex::Text(map) => map.len(),
            FieldIndex::Number(map) => map.len(),
            FieldIndex::DateTime(map) => map.len(),
            FieldIndex::Flag(map) => map.len(),
            FieldIndex::Members { elements, .. } => elements.len(),
        }
    }

    /// Slots satisfying `operand`.
    pub fn lookup(&self, operand: &Operand) -> Result<SlotSet, LookupError> {
        let slots = match (self, operand) {
            (FieldIndex::Text(map), Operand::Text(pattern)) => match pattern {
                TextPattern::Exact(s) => map.get(s).cloned().unwrap_or_default(),
                TextPattern::Prefix(p) => union_of(
                    map.range::<str, _>((Bound::Included(p.as_str()), Bound::Unbounded))
                        .take_while(|(k, _)| k.starts_with(p.as_str()))
                        .map(|(_, s)| s),
                ),
                TextPattern::Suffix(p) => {
                    union_of(map.iter().filter(|(k, _)| k.ends_with(p.as_str())).map(|(_, s)| s))
                }
                TextPattern::Contains(p) => {
                    union_of(map.iter().filter(|(k, _)| k.contains(p.as_str())).map(|(_, s)| s))
                }
                TextPattern::Glob(_) => {
                    let re = pattern.compile()?;
                    union_of(map.iter().filter(|(k, _)| re.is_match(k)).map(|(_, s)| s))
                }
            },
            (
                FieldIndex::Number(map),
                Operand::Compare {
                    comparator,
                    value: Scalar::Number(n),
                },
            ) => compare_range(map, *comparator, &NumberKey::new(*n)),
            (
                FieldIndex::DateTime(map),
                Operand::Compare {
                    comparator,
                    value: Scalar::DateTime(dt),
                },
            ) => compare_range(map, *comparator, dt),
            (FieldIndex::Flag(map), Operand::Flag(b)) => map.get(b).cloned().unwrap_or_default(),
            (FieldIndex::Members { elements, sizes }, Operand::Members { mode, values }) => {
                let wanted: BTreeSet<&str> = values.iter().map(String::as_str).collect();
                let mut buckets = wanted.iter().map(|v| elements.get(*v));
                let mut slots = match buckets.next() {
                    Some(Some(first)) => first.clone(),
                    _ => SlotSet::new(),
                };
                for bucket in buckets {
                    match bucket {
                        Some(b) => slots.retain(|s| b.contains(s)),
                        None => slots.clear(),
                    }
                    if slots.is_empty() {
                        break;
                    }
                }
                if *mode == MembershipMode::Exact {
                    slots.retain(|s| sizes.get(s) == Some(&wanted.len()));
                }
                slots
            }
            (index, operand) => {
                return Err(LookupError::Mismatch {
                    operand: operand_kind(operand),
                    index: index.kind(),
                })
            }
        };
        Ok(slots)
    }
}
