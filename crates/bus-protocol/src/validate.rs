// validate: Schema validation for incoming frames.
//
// Two named schemas, Bus (ingest port) and Bounds (browser port), each a
// list of (field, kind, human message) descriptors.  Validation failures map
// onto three canonical error documents:
//
//   parse failure          -> {"errors":["Requires valid JSON"],"msgType":"Errors"}
//   shape mismatch         -> {"errors":["Requires msgType specified"],"msgType":"Errors"}
//   field kind mismatch    -> {"errors":["<field message>"],"msgType":"Errors"}
//
// Shape mismatches (missing field, unknown field, non-object where an object
// is required) take priority over kind mismatches; kind mismatches are
// reported for the first offending field in schema order.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{Bounds, Bus, ErrorsDocument, msg_types};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The frame is not parseable JSON.
    #[error("Requires valid JSON")]
    InvalidJson,
    /// The frame parses but does not have the required structure.
    #[error("Requires msgType specified")]
    BadShape,
    /// A required field is present with the wrong kind.
    #[error("{0}")]
    BadField(String),
}

impl ValidationError {
    /// The canonical error document for this failure, ready to send back to
    /// the offending peer.
    pub fn document(&self) -> String {
        ErrorsDocument::single(self.to_string()).to_json()
    }
}

// ---------------------------------------------------------------------------
// Schema registry
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Kind {
    Float,
    Text,
}

struct FieldSpec {
    name: &'static str,
    kind: Kind,
    message: &'static str,
}

const BUS_SCHEMA: &[FieldSpec] = &[
    FieldSpec {
        name: "busId",
        kind: Kind::Text,
        message: "Номер автобуса должен быть строкой.",
    },
    FieldSpec {
        name: "lat",
        kind: Kind::Float,
        message: "Широта должна быть числом с плавающей точкой.",
    },
    FieldSpec {
        name: "lng",
        kind: Kind::Float,
        message: "Долгота должна быть числом с плавающей точкой.",
    },
    FieldSpec {
        name: "route",
        kind: Kind::Text,
        message: "Номер маршрута должен быть строкой.",
    },
];

const BOUNDS_SCHEMA: &[FieldSpec] = &[
    FieldSpec {
        name: "south_lat",
        kind: Kind::Float,
        message: "Нижняя граница карты должна быть числом с плавающей точкой.",
    },
    FieldSpec {
        name: "north_lat",
        kind: Kind::Float,
        message: "Верхняя граница карты должна быть числом с плавающей точкой.",
    },
    FieldSpec {
        name: "west_lng",
        kind: Kind::Float,
        message: "Левая граница карты должна быть числом с плавающей точкой.",
    },
    FieldSpec {
        name: "east_lng",
        kind: Kind::Float,
        message: "Правая граница карты должна быть числом с плавающей точкой.",
    },
];

const BAD_MSG_TYPE: &str = "Тип сообщения должен быть строкой \"newBounds\".";

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate a frame from the ingest port as a [`Bus`].
pub fn validate_bus(text: &str) -> Result<Bus, ValidationError> {
    let object = parse_object(text)?;
    check_schema(&object, BUS_SCHEMA)?;
    serde_json::from_value(Value::Object(object)).map_err(|_| ValidationError::BadShape)
}

/// Validate a frame from the browser port as a `newBounds` payload.
pub fn validate_bounds(text: &str) -> Result<Bounds, ValidationError> {
    let mut object = parse_object(text)?;
    if object.keys().any(|key| key != "msgType" && key != "data") {
        return Err(ValidationError::BadShape);
    }
    let (Some(msg_type), Some(data)) = (object.remove("msgType"), object.remove("data")) else {
        return Err(ValidationError::BadShape);
    };
    if msg_type.as_str() != Some(msg_types::NEW_BOUNDS) {
        return Err(ValidationError::BadField(BAD_MSG_TYPE.to_owned()));
    }
    let Value::Object(data) = data else {
        return Err(ValidationError::BadShape);
    };
    check_schema(&data, BOUNDS_SCHEMA)?;
    serde_json::from_value(Value::Object(data)).map_err(|_| ValidationError::BadShape)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn parse_object(text: &str) -> Result<Map<String, Value>, ValidationError> {
    let value: Value = serde_json::from_str(text).map_err(|_| ValidationError::InvalidJson)?;
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(ValidationError::BadShape),
    }
}

/// Structure first (unknown or missing fields), then kinds in schema order.
fn check_schema(object: &Map<String, Value>, schema: &[FieldSpec]) -> Result<(), ValidationError> {
    if object
        .keys()
        .any(|key| !schema.iter().any(|spec| spec.name == key))
    {
        return Err(ValidationError::BadShape);
    }
    if schema.iter().any(|spec| !object.contains_key(spec.name)) {
        return Err(ValidationError::BadShape);
    }
    for spec in schema {
        let value = object.get(spec.name).unwrap_or(&Value::Null);
        let kind_ok = match spec.kind {
            Kind::Float => value.as_f64().is_some_and(f64::is_finite),
            Kind::Text => value.is_string(),
        };
        if !kind_ok {
            return Err(ValidationError::BadField(spec.message.to_owned()));
        }
    }
    Ok(())
}
