//! Persisted record format for pending operations.
//!
//! Durable stores keep each operation as a JSON document tagged with a
//! format version. Readers upgrade older versions one step at a time and
//! refuse versions newer than they understand, leaving the stored row
//! untouched so a newer build can still read it.

use crate::{error::Result, Error, FormatVersion, PendingOperation, Sequence};
use serde::{Deserialize, Serialize};

/// Version of the persisted operation format written by this build.
pub const PERSIST_FORMAT_VERSION: FormatVersion = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordOut<'a> {
    format_version: FormatVersion,
    #[serde(flatten)]
    operation: &'a PendingOperation,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordHeader {
    format_version: Option<FormatVersion>,
}

/// Serialize an operation to its persisted form.
pub fn encode_operation(op: &PendingOperation) -> Result<String> {
    serde_json::to_string(&RecordOut {
        format_version: PERSIST_FORMAT_VERSION,
        operation: op,
    })
    .map_err(|e| Error::InvalidRecord(e.to_string()))
}

/// Read an operation from its persisted form.
///
/// `seq` is stored outside the document (it is the row key) and is attached
/// here.
pub fn decode_operation(raw: &str, seq: Sequence) -> Result<PendingOperation> {
    let mut value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| Error::InvalidRecord(e.to_string()))?;

    let header: RecordHeader =
        serde_json::from_value(value.clone()).map_err(|e| Error::InvalidRecord(e.to_string()))?;
    let mut version = header
        .format_version
        .ok_or_else(|| Error::InvalidRecord("missing formatVersion".into()))?;

    if version > PERSIST_FORMAT_VERSION {
        return Err(Error::UnsupportedFormatVersion {
            found: version,
            supported: PERSIST_FORMAT_VERSION,
        });
    }

    while version < PERSIST_FORMAT_VERSION {
        value = upgrade_step(version, value)?;
        version += 1;
    }

    if let Some(obj) = value.as_object_mut() {
        obj.remove("formatVersion");
    }

    let mut op: PendingOperation =
        serde_json::from_value(value).map_err(|e| Error::InvalidRecord(e.to_string()))?;
    op.seq = seq;
    Ok(op)
}

/// Rewrite a record of format `from` into format `from + 1`.
fn upgrade_step(from: FormatVersion, _value: serde_json::Value) -> Result<serde_json::Value> {
    // Format 1 is the first persisted format; nothing older was ever written.
    Err(Error::InvalidRecord(format!(
        "no upgrade path from format version {}",
        from
    )))
}
