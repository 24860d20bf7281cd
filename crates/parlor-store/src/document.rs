//! Document model: filters, update operators, and write batches.
//!
//! Documents are plain JSON objects. Field paths are dotted strings
//! (`"participants.3.marked"`); a numeric segment indexes into an array.
//! When matching, a non-numeric segment applied to an array fans out over
//! its elements, so `"participants.user_id"` matches if *any* participant
//! has that id.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::StoreError;

/// A stored document.
pub type Document = Map<String, Value>;

/// The field every collection uses as its primary key.
pub const ID_FIELD: &str = "_id";

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A single predicate on a field path.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value (or, for arrays, contains it).
    Eq(Value),
    /// Negation of [`Condition::Eq`]. Missing fields match.
    Ne(Value),
    /// Field equals any of the values.
    In(Vec<Value>),
}

/// A conjunction of field conditions, built fluently.
///
/// ```rust
/// use parlor_store::Filter;
///
/// let filter = Filter::new()
///     .eq("guild_id", "42")
///     .is_in("state", ["waiting", "in_progress"]);
/// assert_eq!(filter.clauses().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    /// An empty filter; matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `Filter::new().eq("_id", id)`.
    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::new().eq(ID_FIELD, id)
    }

    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((path.into(), Condition::Eq(value.into())));
        self
    }

    pub fn ne(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((path.into(), Condition::Ne(value.into())));
        self
    }

    pub fn is_in<I, V>(mut self, path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.clauses.push((path.into(), Condition::In(values)));
        self
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    /// Returns `true` if every clause holds for `doc`.
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|(path, condition)| {
            let found = resolve(doc, path);
            match condition {
                Condition::Eq(expected) => any_equal(&found, expected),
                Condition::Ne(expected) => !any_equal(&found, expected),
                Condition::In(options) => options.iter().any(|o| any_equal(&found, o)),
            }
        })
    }

    /// Equality clauses on plain (non-indexed) paths. These seed the new
    /// document when an upsert finds no match.
    pub(crate) fn equality_seed(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.clauses.iter().filter_map(|(path, condition)| match condition {
            Condition::Eq(value) if !path.split('.').any(is_index) => {
                Some((path.as_str(), value))
            }
            _ => None,
        })
    }
}

fn any_equal(found: &[&Value], expected: &Value) -> bool {
    found.iter().any(|v| {
        *v == expected
            || matches!(v, Value::Array(items) if items.iter().any(|i| i == expected))
    })
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Collects every value addressed by `path`, fanning out over arrays.
pub fn resolve<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*head) {
            resolve_into(value, rest, &mut out);
        }
    }
    out
}

fn resolve_into<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(next) = map.get(*head) {
                resolve_into(next, rest, out);
            }
        }
        Value::Array(items) if is_index(head) => {
            if let Some(next) = head.parse::<usize>().ok().and_then(|i| items.get(i)) {
                resolve_into(next, rest, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve_into(item, segments, out);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// One update operator.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// `$set`: overwrite the field.
    Set(String, Value),
    /// `$push`: append to an array field, creating it if missing.
    Push(String, Value),
    /// `$inc`: add to a numeric field, creating it if missing.
    Inc(String, i64),
    /// `$setOnInsert`: only applied when an upsert inserts.
    SetOnInsert(String, Value),
}

/// A targeted update: a list of operators applied in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(path.into(), value.into()));
        self
    }

    pub fn push(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Push(path.into(), value.into()));
        self
    }

    pub fn inc(mut self, path: impl Into<String>, by: i64) -> Self {
        self.ops.push(UpdateOp::Inc(path.into(), by));
        self
    }

    pub fn set_on_insert(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::SetOnInsert(path.into(), value.into()));
        self
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies the operators to `doc`. Either every operator applies or the
    /// document is left untouched. Returns whether the document changed.
    pub fn apply(&self, doc: &mut Document, inserting: bool) -> Result<bool, StoreError> {
        let mut next = doc.clone();
        for op in &self.ops {
            match op {
                UpdateOp::Set(path, value) => set_path(&mut next, path, value.clone())?,
                UpdateOp::SetOnInsert(path, value) if inserting => {
                    set_path(&mut next, path, value.clone())?
                }
                UpdateOp::SetOnInsert(..) => {}
                UpdateOp::Push(path, value) => push_path(&mut next, path, value.clone())?,
                UpdateOp::Inc(path, by) => inc_path(&mut next, path, *by)?,
            }
        }
        let modified = next != *doc;
        *doc = next;
        Ok(modified)
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidUpdate {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Walks to the slot addressed by `path`, creating intermediate objects.
fn slot_mut<'a>(doc: &'a mut Document, path: &str) -> Result<&'a mut Value, StoreError> {
    let mut segments = path.split('.');
    let head = segments.next().unwrap_or_default();
    let mut current = doc.entry(head.to_string()).or_insert(Value::Null);
    for segment in segments {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Array(items) => {
                if !is_index(segment) {
                    return Err(invalid(path, "cannot descend into an array"));
                }
                let index: usize = segment
                    .parse()
                    .map_err(|_| invalid(path, "array index out of range"))?;
                items
                    .get_mut(index)
                    .ok_or_else(|| invalid(path, format!("no array element {index}")))?
            }
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            other => {
                return Err(invalid(
                    path,
                    format!("cannot descend into {}", kind_of(other)),
                ));
            }
        };
    }
    Ok(current)
}

fn set_path(doc: &mut Document, path: &str, value: Value) -> Result<(), StoreError> {
    *slot_mut(doc, path)? = value;
    Ok(())
}

fn push_path(doc: &mut Document, path: &str, value: Value) -> Result<(), StoreError> {
    let slot = slot_mut(doc, path)?;
    match slot {
        Value::Null => *slot = Value::Array(vec![value]),
        Value::Array(items) => items.push(value),
        other => return Err(invalid(path, format!("$push onto {}", kind_of(other)))),
    }
    Ok(())
}

fn inc_path(doc: &mut Document, path: &str, by: i64) -> Result<(), StoreError> {
    let slot = slot_mut(doc, path)?;
    let next = match slot {
        Value::Null => Value::from(by),
        Value::Number(n) if n.is_i64() => Value::from(n.as_i64().unwrap_or_default() + by),
        Value::Number(n) if n.is_u64() => {
            Value::from(n.as_u64().unwrap_or_default() as i64 + by)
        }
        Value::Number(n) => Value::from(n.as_f64().unwrap_or_default() + by as f64),
        other => return Err(invalid(path, format!("$inc on {}", kind_of(other)))),
    };
    *slot = next;
    Ok(())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Queries and batches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Sort and limit for [`Store::find`](crate::Store::find).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort_asc(mut self, path: impl Into<String>) -> Self {
        self.sort.push((path.into(), SortOrder::Ascending));
        self
    }

    pub fn sort_desc(mut self, path: impl Into<String>) -> Self {
        self.sort.push((path.into(), SortOrder::Descending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Orders two documents by the configured sort keys.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (path, order) in &self.sort {
            let left = resolve(a, path).first().copied();
            let right = resolve(b, path).first().copied();
            let ordering = compare_values(left, right);
            let ordering = match order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Missing < null < bool < number < string; arrays and objects compare equal.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// One operation inside a [`Store::bulk_write`](crate::Store::bulk_write).
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    InsertOne(Document),
    UpdateOne {
        filter: Filter,
        update: Update,
        upsert: bool,
    },
}

/// Outcome of a single `update_one`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
    pub upserted: bool,
}

/// A per-operation failure inside a bulk write.
#[derive(Debug)]
pub struct BulkWriteFailure {
    /// Position of the failed operation in the submitted batch.
    pub index: usize,
    pub error: StoreError,
}

/// Aggregate outcome of a bulk write.
///
/// With `ordered = false` every operation is attempted and failures are
/// collected here; with `ordered = true` the batch stops at the first
/// failure.
#[derive(Debug, Default)]
pub struct BulkWriteResult {
    pub inserted: u64,
    pub matched: u64,
    pub modified: u64,
    pub upserted: u64,
    pub failures: Vec<BulkWriteFailure>,
}

impl BulkWriteResult {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
