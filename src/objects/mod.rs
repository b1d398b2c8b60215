//! Object-list backend.
//!
//! Objects are added once and indexed under every registered field; queries
//! are answered by set algebra over the covering indexes and return objects
//! in the order they were added.
//!
//! # Example
//!
//! ```rust
//! use pubquery::{FieldRegistry, FieldType, ObjectListQuery};
//! use serde_json::json;
//!
//! let fields = FieldRegistry::builder()
//!     .path("name", "nm", FieldType::String, "name")
//!     .path("legs", "lg", FieldType::Int, "appendages.legs")
//!     .build()
//!     .unwrap();
//!
//! let mut animals = ObjectListQuery::new(fields);
//! animals.add_objects(vec![
//!     json!({"name": "zebra", "appendages": {"legs": 4}}),
//!     json!({"name": "duck", "appendages": {"legs": 2}}),
//! ]).unwrap();
//!
//! let found = animals.query("z*[nm] and >2[legs]").unwrap();
//! assert_eq!(found, vec![&json!({"name": "zebra", "appendages": {"legs": 4}})]);
//! ```

mod identifier;
mod index;

pub use identifier::{IdentifierStrategy, ObjectId, SequentialIds, UuidIds};
pub use index::{FieldIndex, LookupError, NumberKey, Slot, SlotSet};

use crate::config::{AccessorFailurePolicy, IdentifierKind, IndexConfig};
use crate::error::{AccessorError, QueryError, QueryResult};
use crate::field::{BoxedAccessor, FieldRegistry};
use crate::query::{parse, Expression, QueryBackend};

/// An accessor failure recorded while adding objects.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorFailure {
    pub id: ObjectId,
    pub field: String,
    pub error: AccessorError,
}

/// Outcome of one `add_objects` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddReport {
    /// Objects stored and indexed.
    pub added: usize,
    /// Objects left out entirely (`SkipObject` policy).
    pub rejected: Vec<ObjectId>,
    /// Every accessor failure, whatever the policy did about it.
    pub failures: Vec<AccessorFailure>,
}

struct StoredObject<T> {
    id: ObjectId,
    object: T,
}

/// In-memory evaluator over a growing collection of objects.
///
/// `add_objects` needs `&mut self` and `query` only `&self`, so writers are
/// serialised against readers by the borrow checker.
pub struct ObjectListQuery<T> {
    fields: FieldRegistry<BoxedAccessor<T>>,
    config: IndexConfig,
    identifiers: Box<dyn IdentifierStrategy<T> + Send + Sync>,
    objects: Vec<StoredObject<T>>,
    indexes: Vec<FieldIndex>,
}

impl<T> ObjectListQuery<T> {
    pub fn new(fields: FieldRegistry<BoxedAccessor<T>>) -> Self {
        Self::with_config(fields, IndexConfig::default())
    }

    pub fn with_config(fields: FieldRegistry<BoxedAccessor<T>>, config: IndexConfig) -> Self {
        let identifiers: Box<dyn IdentifierStrategy<T> + Send + Sync> = match config.identifiers {
            IdentifierKind::Sequential => Box::new(SequentialIds::default()),
            IdentifierKind::Uuid => Box::new(UuidIds),
        };
        let indexes = fields
            .iter()
            .map(|field| FieldIndex::for_type(field.field_type))
            .collect();

        Self {
            fields,
            config,
            identifiers,
            objects: Vec::new(),
            indexes,
        }
    }

    /// Replace the identifier strategy used by [`add_objects`](Self::add_objects).
    pub fn with_identifiers<S>(mut self, strategy: S) -> Self
    where
        S: IdentifierStrategy<T> + Send + Sync + 'static,
    {
        self.identifiers = Box::new(strategy);
        self
    }

    pub fn fields(&self) -> &FieldRegistry<BoxedAccessor<T>> {
        &self.fields
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Add objects, naming them with the configured identifier strategy.
    pub fn add_objects<I>(&mut self, objects: I) -> QueryResult<AddReport>
    where
        I: IntoIterator<Item = T>,
    {
        // Detached while the batch runs so it can be borrowed alongside `self`.
        let mut strategy = std::mem::replace(&mut self.identifiers, Box::new(UuidIds));
        let result = self.add_batch(objects, strategy.as_mut());
        self.identifiers = strategy;
        result
    }

    /// Add objects, naming them with `strategy`.
    pub fn add_objects_with<I, S>(&mut self, objects: I, strategy: &mut S) -> QueryResult<AddReport>
    where
        I: IntoIterator<Item = T>,
        S: IdentifierStrategy<T>,
    {
        self.add_batch(objects, strategy)
    }

    fn add_batch<I>(
        &mut self,
        objects: I,
        strategy: &mut dyn IdentifierStrategy<T>,
    ) -> QueryResult<AddReport>
    where
        I: IntoIterator<Item = T>,
    {
        let mut report = AddReport::default();
        for object in objects {
            let id = strategy.identify(&object);
            self.add_one(id, object, &mut report)?;
        }
        tracing::debug!(
            added = report.added,
            rejected = report.rejected.len(),
            failures = report.failures.len(),
            total = self.objects.len(),
            "added objects"
        );
        Ok(report)
    }

    /// Read every field first, then insert, so an object is either indexed
    /// under all of its readable fields or not at all.
    fn add_one(&mut self, id: ObjectId, object: T, report: &mut AddReport) -> QueryResult<()> {
        let slot = self.objects.len();
        let mut values = Vec::with_capacity(self.fields.len());

        for field in self.fields.iter() {
            let value = field
                .accessor
                .get(&object)
                .and_then(|v| v.coerce(field.field_type));
            let error = match value {
                Ok(v) => {
                    values.push(Some(v));
                    continue;
                }
                Err(error) => error,
            };

            match self.config.accessor_failure {
                AccessorFailurePolicy::SkipField => {
                    tracing::debug!(id = %id, field = %field.full_name, %error, "field not indexed");
                    report.failures.push(AccessorFailure {
                        id: id.clone(),
                        field: field.full_name.clone(),
                        error,
                    });
                    values.push(None);
                }
                AccessorFailurePolicy::SkipObject => {
                    tracing::debug!(id = %id, field = %field.full_name, %error, "object not indexed");
                    report.failures.push(AccessorFailure {
                        id: id.clone(),
                        field: field.full_name.clone(),
                        error,
                    });
                    report.rejected.push(id);
                    return Ok(());
                }
                AccessorFailurePolicy::Fail => {
                    tracing::warn!(id = %id, field = %field.full_name, %error, "accessor failed, stopping");
                    return Err(QueryError::Accessor {
                        field: field.full_name.clone(),
                        id: id.to_string(),
                        source: error,
                    });
                }
            }
        }

        for (index, value) in self.indexes.iter_mut().zip(values) {
            if let Some(value) = value {
                index.insert(slot, value);
            }
        }
        self.objects.push(StoredObject { id, object });
        report.added += 1;
        Ok(())
    }

    /// Objects matching `query`, in addition order. A blank query matches
    /// every object.
    pub fn query(&self, query: &str) -> QueryResult<Vec<&T>> {
        let slots = self.query_slots(query)?;
        Ok(slots.into_iter().map(|s| &self.objects[s].object).collect())
    }

    /// Identifiers of the objects matching `query`, in addition order.
    pub fn query_ids(&self, query: &str) -> QueryResult<Vec<&ObjectId>> {
        let slots = self.query_slots(query)?;
        Ok(slots.into_iter().map(|s| &self.objects[s].id).collect())
    }

    fn query_slots(&self, query: &str) -> QueryResult<SlotSet> {
        if query.trim().is_empty() {
            return Ok(self.universe());
        }
        let expression = parse(query, &self.fields)?;
        let slots = self.translate(&expression)?;
        tracing::debug!(query, matched = slots.len(), total = self.objects.len(), "evaluated query");
        Ok(slots)
    }

    fn universe(&self) -> SlotSet {
        (0..self.objects.len()).collect()
    }

    fn evaluate(&self, expression: &Expression) -> QueryResult<SlotSet> {
        match expression {
            Expression::Condition(condition) => {
                let index = self
                    .indexes
                    .get(condition.field.index)
                    .ok_or_else(|| QueryError::UnknownField(condition.field.name.clone()))?;
                index.lookup(&condition.operand).map_err(|e| match e {
                    LookupError::Mismatch { .. } => QueryError::UnsupportedCondition {
                        backend: "objects",
                        field: condition.field.name.clone(),
                        reason: e.to_string(),
                    },
                    LookupError::Pattern(_) => QueryError::operand(
                        condition.field.name.as_str(),
                        condition.raw.as_str(),
                        e.to_string(),
                    ),
                })
            }
            Expression::Not(inner) => {
                let excluded = self.evaluate(inner)?;
                Ok(self.universe().difference(&excluded).copied().collect())
            }
            Expression::And(left, right) => {
                let mut slots = self.evaluate(left)?;
                if slots.is_empty() {
                    return Ok(slots);
                }
                let other = self.evaluate(right)?;
                slots.retain(|s| other.contains(s));
                Ok(slots)
            }
            Expression::Or(left, right) => {
                let mut slots = self.evaluate(left)?;
                slots.extend(self.evaluate(right)?);
                Ok(slots)
            }
        }
    }

    /// Most recently added object with this identifier.
    pub fn get(&self, id: &ObjectId) -> Option<&T> {
        self.objects
            .iter()
            .rev()
            .find(|stored| &stored.id == id)
            .map(|stored| &stored.object)
    }

    /// All objects with their identifiers, in addition order.
    pub fn objects(&self) -> impl Iterator<Item = (&ObjectId, &T)> {
        self.objects.iter().map(|stored| (&stored.id, &stored.object))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl<T> QueryBackend for ObjectListQuery<T> {
    type Output = SlotSet;

    fn translate(&self, expression: &Expression) -> QueryResult<SlotSet> {
        self.evaluate(expression)
    }
}
