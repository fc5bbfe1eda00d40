//! Passenger record decoded from a loosely-typed prediction payload

use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_PCLASS: i64 = 3;
pub const DEFAULT_AGE: f64 = 25.0;
pub const DEFAULT_FARE: f64 = 32.0;
pub const DEFAULT_SEX_MALE: i64 = 1;

/// A payload field could not be coerced into a number
#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("field '{field}': could not convert string to float: '{value}'")]
    InvalidFloat { field: &'static str, value: String },

    #[error("field '{field}': invalid integer literal: '{value}'")]
    InvalidInteger { field: &'static str, value: String },

    #[error("field '{field}': cannot convert non-finite number to integer")]
    NonFinite { field: &'static str },

    #[error("field '{field}': expected a number, got {kind}")]
    WrongType {
        field: &'static str,
        kind: &'static str,
    },
}

/// Passenger attributes the gates are queried with.
///
/// Fields absent from the payload take their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Passenger {
    /// Ticket class (1, 2 or 3)
    pub pclass: i64,
    /// Age in years
    pub age: f64,
    /// Ticket fare
    pub fare: f64,
    /// 1 = male, 0 = female
    pub sex_male: i64,
}

impl Default for Passenger {
    fn default() -> Self {
        Self {
            pclass: DEFAULT_PCLASS,
            age: DEFAULT_AGE,
            fare: DEFAULT_FARE,
            sex_male: DEFAULT_SEX_MALE,
        }
    }
}

impl Passenger {
    /// Decode a passenger from a JSON object.
    ///
    /// Unknown keys are ignored. A key that is present but `null` is an error,
    /// not a request for the default.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, FeatureError> {
        Ok(Self {
            pclass: int_field(payload, "pclass", DEFAULT_PCLASS)?,
            age: float_field(payload, "age", DEFAULT_AGE)?,
            fare: float_field(payload, "fare", DEFAULT_FARE)?,
            sex_male: int_field(payload, "sex_male", DEFAULT_SEX_MALE)?,
        })
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn float_field(
    payload: &Map<String, Value>,
    field: &'static str,
    default: f64,
) -> Result<f64, FeatureError> {
    let Some(value) = payload.get(field) else {
        return Ok(default);
    };

    match value {
        Value::Number(n) => n.as_f64().ok_or(FeatureError::WrongType {
            field,
            kind: "number",
        }),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FeatureError::InvalidFloat {
                field,
                value: s.clone(),
            }),
        other => Err(FeatureError::WrongType {
            field,
            kind: kind_of(other),
        }),
    }
}

fn int_field(
    payload: &Map<String, Value>,
    field: &'static str,
    default: i64,
) -> Result<i64, FeatureError> {
    let Some(value) = payload.get(field) else {
        return Ok(default);
    };

    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                if f.is_finite() {
                    // Truncate toward zero
                    Ok(f.trunc() as i64)
                } else {
                    Err(FeatureError::NonFinite { field })
                }
            }
        }
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| FeatureError::InvalidInteger {
                field,
                value: s.clone(),
            }),
        other => Err(FeatureError::WrongType {
            field,
            kind: kind_of(other),
        }),
    }
}
