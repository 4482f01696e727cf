//! Conversion between the JSON wire format and BSON, including identifier
//! coercion and legacy flag normalization driven by [`CollectionSchema`].

use mongodb::bson::{oid::ObjectId, to_bson, Bson, Document};
use serde_json::{Map, Value};

use crate::{error::QueryError, models::catalog::parse_flag_text, schema::CollectionSchema};

const LOGICAL_OPERATORS: &[&str] = &["$and", "$or", "$nor"];

/// True for exactly 24 hexadecimal characters.
pub fn looks_like_object_id(value: &str) -> bool {
    value.len() == 24 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn json_to_bson(value: &Value) -> Result<Bson, QueryError> {
    to_bson(value)
        .map_err(|e| QueryError::Conversion(format!("Failed to convert JSON to BSON: {}", e)))
}

/// Converts a JSON object into a document; `what` names the field in the
/// error when the value is not an object.
pub fn json_to_document(value: &Value, what: &str) -> Result<Document, QueryError> {
    match json_to_bson(value)? {
        Bson::Document(doc) => Ok(doc),
        _ => Err(QueryError::validation(format!("{} must be an object", what))),
    }
}

/// Replaces 24-hex strings in the schema's identifier fields with
/// `ObjectId`s. Operator values (`$in`, `$nin`, `$eq`, `$ne`) and nested
/// `$and`/`$or`/`$nor` clauses are handled; anything else is left as is.
pub fn coerce_identifiers(doc: &mut Document, schema: &CollectionSchema) {
    for (key, value) in doc.iter_mut() {
        if LOGICAL_OPERATORS.contains(&key.as_str()) {
            if let Bson::Array(clauses) = value {
                for clause in clauses.iter_mut() {
                    if let Bson::Document(clause) = clause {
                        coerce_identifiers(clause, schema);
                    }
                }
            }
        } else if schema.is_id_field(key) {
            coerce_identifier_value(value);
        }
    }
}

pub fn coerce_identifier_value(value: &mut Bson) {
    match value {
        Bson::String(text) => {
            if let Some(oid) = parse_object_id(text) {
                *value = Bson::ObjectId(oid);
            }
        }
        Bson::Document(operators) => {
            for (operator, operand) in operators.iter_mut() {
                match operator.as_str() {
                    "$in" | "$nin" => {
                        if let Bson::Array(items) = operand {
                            items.iter_mut().for_each(coerce_identifier_value);
                        }
                    }
                    "$eq" | "$ne" => coerce_identifier_value(operand),
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn parse_object_id(text: &str) -> Option<ObjectId> {
    if looks_like_object_id(text) {
        ObjectId::parse_str(text).ok()
    } else {
        None
    }
}

/// Rewrites legacy encodings (`"0"`/`"1"`, `"true"`/`"false"`, `0`/`1`) of
/// the schema's flag fields to native booleans. Unrecognized values are
/// kept.
pub fn normalize_flags(doc: &mut Document, schema: &CollectionSchema) {
    for (key, value) in doc.iter_mut() {
        if !schema.is_flag_field(key) {
            continue;
        }
        let normalized = match value {
            Bson::String(text) => parse_flag_text(text),
            Bson::Int32(n) => Some(*n != 0),
            Bson::Int64(n) => Some(*n != 0),
            _ => None,
        };
        if let Some(flag) = normalized {
            *value = Bson::Boolean(flag);
        }
    }
}

/// Identifier coercion plus flag normalization, for documents being written.
pub fn prepare_payload(
    value: &Value,
    what: &str,
    schema: &CollectionSchema,
) -> Result<Document, QueryError> {
    let mut doc = json_to_document(value, what)?;
    coerce_identifiers(&mut doc, schema);
    normalize_flags(&mut doc, schema);
    Ok(doc)
}

/// Identifier coercion only, for filters.
pub fn prepare_filter(value: &Value, schema: &CollectionSchema) -> Result<Document, QueryError> {
    let mut doc = json_to_document(value, "Query")?;
    coerce_identifiers(&mut doc, schema);
    Ok(doc)
}

/// Renders BSON for the response body: `ObjectId` as its hex string, dates
/// as RFC 3339, everything else as relaxed extended JSON.
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(text) => Value::String(text),
            Err(_) => Value::from(dt.timestamp_millis()),
        },
        Bson::Document(doc) => document_to_json(doc),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Int32(n) => Value::from(n),
        Bson::Int64(n) => Value::from(n),
        Bson::Double(n) => serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(text) => Value::String(text),
        Bson::Boolean(flag) => Value::Bool(flag),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

pub fn document_to_json(doc: Document) -> Value {
    let map: Map<String, Value> = doc
        .into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect();
    Value::Object(map)
}

pub fn documents_to_json(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(document_to_json).collect())
}
