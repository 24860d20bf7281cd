//! Conversion between typed records and store documents.
//!
//! This is the only place records meet `serde_json`; everything above it
//! works with typed values.

use chrono::{DateTime, Utc};
use parlor_store::{Document, StoreError};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

pub fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Codec(<serde_json::Error as serde::ser::Error>::custom(
            format!("record serialized to {other}, expected an object"),
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// A single value, for use in `$set`/`$push` operators.
pub fn to_value<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}

/// A timestamp in the same form the record fields use.
pub fn timestamp(at: DateTime<Utc>) -> Result<Value, StoreError> {
    to_value(&at)
}
