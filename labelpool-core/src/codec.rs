//! Serialization codec for stored blobs.
//!
//! Every blob carries a one-byte encoding tag followed by a JSON body:
//!
//! - `R` (record): the value serialized as-is. Used for single rows,
//!   scalars, index lists, and anything that is not table-shaped.
//! - `T` (table): column-major layout for a non-empty array of objects
//!   that all share the same key set. Column names are written once, each
//!   row becomes a positional vector.
//!
//! The encoding is picked from the value's shape; callers never choose.
//! `decode` is the exact inverse of `encode` for every value `encode`
//! accepted (non-finite floats cannot be represented and are rejected by
//! serde_json before a blob exists).

use crate::error::CodecError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const RECORD_TAG: u8 = b'R';
const TABLE_TAG: u8 = b'T';

/// Which encoding a blob uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Record,
    Table,
}

/// Column-major representation of a uniform list of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from records, or `None` if they are not table-shaped.
    ///
    /// Table-shaped means: at least one record, every record is an object,
    /// and every object has exactly the same keys.
    pub fn from_records(records: &[Value]) -> Option<Table> {
        let first = records.first()?.as_object()?;
        let columns: Vec<String> = first.keys().cloned().collect();

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let object = record.as_object()?;
            if object.len() != columns.len() {
                return None;
            }
            let mut row = Vec::with_capacity(columns.len());
            for column in &columns {
                row.push(object.get(column)?.clone());
            }
            rows.push(row);
        }

        Some(Table { columns, rows })
    }

    /// Rebuild the original array of objects.
    pub fn into_records(self) -> Result<Value, CodecError> {
        let mut records = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.into_iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(CodecError::Decode {
                    reason: format!(
                        "table row {} has {} cells, expected {}",
                        i,
                        row.len(),
                        self.columns.len()
                    ),
                });
            }
            let object: Map<String, Value> = self.columns.iter().cloned().zip(row).collect();
            records.push(Value::Object(object));
        }
        Ok(Value::Array(records))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Encode any serializable value into a tagged blob.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let value = serde_json::to_value(value).map_err(|e| CodecError::Encode {
        reason: e.to_string(),
    })?;
    encode_value(&value)
}

/// Encode an already-built JSON value into a tagged blob.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, CodecError> {
    let table = match value {
        Value::Array(records) => Table::from_records(records),
        _ => None,
    };

    let (tag, body) = match table {
        Some(table) => (TABLE_TAG, serde_json::to_vec(&table)),
        None => (RECORD_TAG, serde_json::to_vec(value)),
    };
    let body = body.map_err(|e| CodecError::Encode {
        reason: e.to_string(),
    })?;

    let mut blob = Vec::with_capacity(body.len() + 1);
    blob.push(tag);
    blob.extend_from_slice(&body);
    Ok(blob)
}

/// Decode a tagged blob into a typed value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let value = decode_value(bytes)?;
    serde_json::from_value(value).map_err(|e| CodecError::Decode {
        reason: e.to_string(),
    })
}

/// Decode a tagged blob into a JSON value.
pub fn decode_value(bytes: &[u8]) -> Result<Value, CodecError> {
    let (tag, body) = bytes.split_first().ok_or(CodecError::Truncated)?;
    match *tag {
        RECORD_TAG => serde_json::from_slice(body).map_err(|e| CodecError::Decode {
            reason: e.to_string(),
        }),
        TABLE_TAG => {
            let table: Table = serde_json::from_slice(body).map_err(|e| CodecError::Decode {
                reason: e.to_string(),
            })?;
            table.into_records()
        }
        other => Err(CodecError::UnknownTag { tag: other }),
    }
}

/// Report which encoding a blob uses without decoding its body.
pub fn encoding_of(bytes: &[u8]) -> Result<Encoding, CodecError> {
    match bytes.first() {
        Some(&RECORD_TAG) => Ok(Encoding::Record),
        Some(&TABLE_TAG) => Ok(Encoding::Table),
        Some(&other) => Err(CodecError::UnknownTag { tag: other }),
        None => Err(CodecError::Truncated),
    }
}


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
