//! Declarative field schemas for resource collections.
//!
//! A schema maps field names to a [`FieldDef`]. It is deserializable from YAML or JSON,
//! either in long form (`title: { type: string, required: true }`) or shorthand
//! (`title: string`). Documents are checked against the schema by [`Schema::prepare_create`]
//! and [`Schema::prepare_patch`] before they reach a store.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Stored record shape shared by every backend.
pub type Document = Map<String, Value>;

/// Fields managed by the collection, never accepted from API input
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("System field '{0}' cannot be set via API input")]
    SystemFieldNotAllowed(String),
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),
    #[error("Field '{field}' expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: String,
    },
    #[error("Invalid date format for field '{field}': {value}")]
    InvalidDate { field: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
    Any,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Any => "any",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFieldDef")]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub default: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFieldDef {
    Short(FieldType),
    Full {
        #[serde(rename = "type")]
        field_type: FieldType,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        unique: bool,
        #[serde(default)]
        default: Option<Value>,
    },
}

impl From<RawFieldDef> for FieldDef {
    fn from(raw: RawFieldDef) -> Self {
        match raw {
            RawFieldDef::Short(field_type) => FieldDef::new(field_type),
            RawFieldDef::Full {
                field_type,
                required,
                unique,
                default,
            } => FieldDef {
                field_type,
                required,
                unique,
                default,
            },
        }
    }
}

impl FieldDef {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            unique: false,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn number() -> Self {
        Self::new(FieldType::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn check(&self, field: &str, value: &Value) -> Result<(), SchemaError> {
        let matches = match (self.field_type, value) {
            (_, Value::Null) => return Ok(()),
            (FieldType::Any, _) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Object, Value::Object(_)) => true,
            (FieldType::Array, Value::Array(_)) => true,
            (FieldType::Date, Value::String(s)) => {
                return DateTime::parse_from_rfc3339(s).map(|_| ()).map_err(|_| {
                    SchemaError::InvalidDate {
                        field: field.to_string(),
                        value: s.clone(),
                    }
                })
            }
            _ => false,
        };

        if matches {
            Ok(())
        } else {
            Err(SchemaError::TypeMismatch {
                field: field.to_string(),
                expected: self.field_type,
                found: json_type_name(value).to_string(),
            })
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Collection-level persistence options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    /// Stamp `created_at`/`updated_at` on writes.
    pub timestamps: bool,
    /// Drop input fields the schema does not declare.
    pub strict: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            timestamps: true,
            strict: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: BTreeMap<String, FieldDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.fields.insert(name.into(), def);
        self
    }

    /// Right-biased merge: fields in `other` replace same-named fields in `self`.
    pub fn merge(mut self, other: Schema) -> Self {
        self.fields.extend(other.fields);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldDef)> {
        self.fields.iter()
    }

    pub fn unique_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, def)| def.unique)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Validate a new document, filling defaults and enforcing required fields.
    pub fn prepare_create(&self, doc: Document, options: &SchemaOptions) -> Result<Document, SchemaError> {
        let mut doc = self.screen(doc, options)?;

        for (name, def) in &self.fields {
            if !doc.contains_key(name) {
                if let Some(default) = &def.default {
                    doc.insert(name.clone(), default.clone());
                }
            }
            let missing = matches!(doc.get(name), None | Some(Value::Null));
            if def.required && missing {
                return Err(SchemaError::MissingRequiredField(name.clone()));
            }
        }

        Ok(doc)
    }

    /// Validate a partial update. Only present fields are checked.
    pub fn prepare_patch(&self, patch: Document, options: &SchemaOptions) -> Result<Document, SchemaError> {
        let patch = self.screen(patch, options)?;

        for (name, value) in &patch {
            if value.is_null() && self.fields.get(name).is_some_and(|def| def.required) {
                return Err(SchemaError::MissingRequiredField(name.clone()));
            }
        }

        Ok(patch)
    }

    fn screen(&self, doc: Document, options: &SchemaOptions) -> Result<Document, SchemaError> {
        let mut screened = Document::new();
        for (key, value) in doc {
            if SYSTEM_FIELDS.contains(&key.as_str()) {
                return Err(SchemaError::SystemFieldNotAllowed(key));
            }
            match self.fields.get(&key) {
                Some(def) => def.check(&key, &value)?,
                None if options.strict => continue,
                None => {}
            }
            screened.insert(key, value);
        }
        Ok(screened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn todo_schema() -> Schema {
        Schema::new()
            .field("title", FieldDef::string().required())
            .field("done", FieldDef::boolean().with_default(false))
    }

    #[test]
    fn create_fills_defaults_and_drops_unknown_fields() {
        let prepared = todo_schema()
            .prepare_create(doc(json!({"title": "milk", "color": "red"})), &SchemaOptions::default())
            .unwrap();
        assert_eq!(Value::Object(prepared), json!({"title": "milk", "done": false}));
    }

    #[test]
    fn non_strict_keeps_unknown_fields() {
        let options = SchemaOptions { strict: false, ..Default::default() };
        let prepared = todo_schema()
            .prepare_create(doc(json!({"title": "milk", "color": "red"})), &options)
            .unwrap();
        assert_eq!(prepared.get("color"), Some(&json!("red")));
    }

    #[test]
    fn create_requires_required_fields() {
        let err = todo_schema()
            .prepare_create(doc(json!({"done": true})), &SchemaOptions::default())
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingRequiredField("title".into()));
    }

    #[test]
    fn rejects_type_mismatch_and_system_fields() {
        let options = SchemaOptions::default();
        let err = todo_schema()
            .prepare_create(doc(json!({"title": 7})), &options)
            .unwrap_err();
        assert!(matches!(err, SchemaError::TypeMismatch { .. }));

        let err = todo_schema()
            .prepare_patch(doc(json!({"id": "abc"})), &options)
            .unwrap_err();
        assert_eq!(err, SchemaError::SystemFieldNotAllowed("id".into()));
    }

    #[test]
    fn patch_cannot_null_a_required_field() {
        let err = todo_schema()
            .prepare_patch(doc(json!({"title": null})), &SchemaOptions::default())
            .unwrap_err();
        assert_eq!(err, SchemaError::MissingRequiredField("title".into()));
    }

    #[test]
    fn date_fields_must_be_rfc3339() {
        let schema = Schema::new().field("due", FieldDef::new(FieldType::Date));
        let options = SchemaOptions::default();
        assert!(schema
            .prepare_create(doc(json!({"due": "2024-05-01T10:00:00Z"})), &options)
            .is_ok());
        assert!(matches!(
            schema.prepare_create(doc(json!({"due": "tomorrow"})), &options),
            Err(SchemaError::InvalidDate { .. })
        ));
    }

    #[test]
    fn merge_is_right_biased() {
        let base = Schema::new().field("username", FieldDef::string().required().unique());
        let merged = base.merge(Schema::new().field("username", FieldDef::string()));
        assert!(!merged.get("username").unwrap().unique);
    }

    #[test]
    fn deserializes_short_and_long_forms() {
        let schema: Schema = serde_yaml::from_str(
            "title: { type: string, required: true }\nnotes: string\n",
        )
        .unwrap();
        assert!(schema.get("title").unwrap().required);
        assert_eq!(schema.get("notes").unwrap().field_type, FieldType::String);
    }
}
