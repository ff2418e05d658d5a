//! Transaction schemas and payload validation.
//!
//! Schemas describe the fields of each transaction collection so that
//! payloads can be rejected before they are queued (client side) or stored
//! (server side). Fields not named by a schema are accepted as-is.

use crate::{error::Result, EntityType, Error, OperationKind, PendingOperation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    /// Strictly positive number (money)
    Amount,
    Int,
    /// Milliseconds since epoch, or an ISO-8601 date string
    Timestamp,
    /// Arbitrary nested JSON
    Json,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Amount => write!(f, "Amount"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Timestamp => write!(f, "Timestamp"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in a transaction document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    /// Must be present (and non-null) on create
    pub required: bool,
}

impl FieldDef {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    ///
    /// `partial` relaxes the presence check for patches: a missing field is
    /// fine, but a required field cannot be cleared with `null`.
    pub fn validate(&self, value: Option<&serde_json::Value>, partial: bool) -> Result<()> {
        match value {
            None if self.required && !partial => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            None => Ok(()),
            Some(serde_json::Value::Null) if self.required => {
                Err(Error::MissingRequiredField(self.name.clone()))
            }
            Some(serde_json::Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &serde_json::Value) -> Result<()> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Amount => {
                if let Some(n) = value.as_f64() {
                    if n <= 0.0 || !n.is_finite() {
                        return Err(Error::NonPositiveAmount(self.name.clone()));
                    }
                    true
                } else {
                    false
                }
            }
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Timestamp => value.is_u64() || value.is_i64() || value.is_string(),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        serde_json::Value::Number(_) => "Float",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        serde_json::Value::Object(_) => "Object",
    }
}

/// Field layout of one transaction collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    pub entity_type: EntityType,
    pub fields: Vec<FieldDef>,
}

impl EntitySchema {
    pub fn new(entity_type: EntityType, fields: Vec<FieldDef>) -> Self {
        Self {
            entity_type,
            fields,
        }
    }

    /// Validate a full document.
    pub fn validate_document(&self, payload: &serde_json::Value) -> Result<()> {
        self.validate_fields(payload, false)
    }

    /// Validate a partial patch.
    pub fn validate_patch(&self, payload: &serde_json::Value) -> Result<()> {
        self.validate_fields(payload, true)
    }

    fn validate_fields(&self, payload: &serde_json::Value, partial: bool) -> Result<()> {
        let obj = payload
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("payload must be an object".into()))?;

        if partial && obj.is_empty() {
            return Err(Error::InvalidPayload("patch has no fields".into()));
        }

        for field in &self.fields {
            field.validate(obj.get(&field.name), partial)?;
        }

        Ok(())
    }
}

/// Schemas for every transaction collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub entities: BTreeMap<EntityType, EntitySchema>,
}

impl Schema {
    /// An empty schema (every collection unknown).
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }

    /// Builder-style method to add an entity schema.
    pub fn with_entity(mut self, entity: EntitySchema) -> Self {
        self.entities.insert(entity.entity_type, entity);
        self
    }

    /// The transaction schemas used by the finance tracker.
    pub fn finance() -> Self {
        Schema::new()
            .with_entity(EntitySchema::new(
                EntityType::Expense,
                vec![
                    FieldDef::required("description", FieldType::String),
                    FieldDef::required("amount", FieldType::Amount),
                    FieldDef::optional("category", FieldType::String),
                    FieldDef::optional("account", FieldType::String),
                    FieldDef::optional("date", FieldType::Timestamp),
                    FieldDef::optional("note", FieldType::String),
                ],
            ))
            .with_entity(EntitySchema::new(
                EntityType::Income,
                vec![
                    FieldDef::required("description", FieldType::String),
                    FieldDef::required("amount", FieldType::Amount),
                    FieldDef::optional("source", FieldType::String),
                    FieldDef::optional("account", FieldType::String),
                    FieldDef::optional("date", FieldType::Timestamp),
                    FieldDef::optional("note", FieldType::String),
                ],
            ))
            .with_entity(EntitySchema::new(
                EntityType::Installment,
                vec![
                    FieldDef::required("description", FieldType::String),
                    FieldDef::required("totalAmount", FieldType::Amount),
                    FieldDef::required("months", FieldType::Int),
                    FieldDef::optional("paidMonths", FieldType::Int),
                    FieldDef::optional("monthlyAmount", FieldType::Amount),
                    FieldDef::optional("startDate", FieldType::Timestamp),
                    FieldDef::optional("note", FieldType::String),
                ],
            ))
    }

    pub fn entity(&self, entity_type: EntityType) -> Result<&EntitySchema> {
        self.entities
            .get(&entity_type)
            .ok_or_else(|| Error::UnknownCollection(entity_type.collection().to_string()))
    }

    /// Validate a payload for the given kind of write.
    pub fn validate(
        &self,
        entity_type: EntityType,
        kind: OperationKind,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let schema = self.entity(entity_type)?;
        match kind {
            OperationKind::Create => schema.validate_document(payload),
            OperationKind::Update => schema.validate_patch(payload),
            OperationKind::Delete => Ok(()),
        }
    }

    /// Validate a pending operation before it is queued or applied.
    pub fn validate_operation(&self, op: &PendingOperation) -> Result<()> {
        self.validate(op.entity_type, op.kind, &op.payload)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::finance()
    }
}
