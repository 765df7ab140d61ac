//! Core types for Scoreline

use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Literal returned to callers in place of a prediction when a request fails
pub const ERROR_SENTINEL: &str = "error";

/// Name of the only recognized field in a scoring request
const DATA_FIELD: &str = "data";

/// A parsed scoring request.
///
/// The body must be a JSON object holding a `data` field. `data` is a flat
/// array of numbers or any rectangular nesting of arrays; it is flattened in
/// row-major order before being reshaped into a feature row. Other fields
/// are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPayload {
    data: Value,
}

impl RequestPayload {
    /// Parse a raw request body
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| Error::invalid_payload(format!("malformed JSON: {}", e)))?;
        Self::from_value(value)
    }

    /// Build a payload from an already-parsed JSON document
    pub fn from_value(value: Value) -> Result<Self> {
        let mut object = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::invalid_payload(format!(
                    "expected a JSON object, got {}",
                    json_type_name(&other)
                )))
            }
        };

        let data = object
            .remove(DATA_FIELD)
            .ok_or_else(|| Error::invalid_payload("missing field `data`"))?;

        Ok(Self { data })
    }

    /// Create a payload from a flat feature vector
    pub fn from_features(features: &[f64]) -> Self {
        Self {
            data: Value::Array(
                features
                    .iter()
                    .map(|v| {
                        serde_json::Number::from_f64(*v)
                            .map(Value::Number)
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            ),
        }
    }

    /// The raw `data` value
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Flatten `data` into a feature vector.
    ///
    /// Fails on non-numeric entries and on ragged nested arrays.
    pub fn features(&self) -> Result<Vec<f64>> {
        let mut out = Vec::new();
        flatten_into(&self.data, &mut out)?;
        Ok(out)
    }
}

fn flatten_into(value: &Value, out: &mut Vec<f64>) -> Result<()> {
    match value {
        Value::Number(n) => {
            let v = n
                .as_f64()
                .ok_or_else(|| Error::invalid_payload(format!("unrepresentable number: {}", n)))?;
            out.push(v);
            Ok(())
        }
        Value::Array(items) => {
            let mut expected: Option<Vec<usize>> = None;
            for item in items {
                let dims = shape_of(item)?;
                match &expected {
                    None => expected = Some(dims),
                    Some(first) if *first != dims => {
                        return Err(Error::invalid_payload(
                            "`data` is a ragged nested array",
                        ))
                    }
                    Some(_) => {}
                }
                flatten_into(item, out)?;
            }
            Ok(())
        }
        other => Err(Error::invalid_payload(format!(
            "non-numeric entry in `data`: {}",
            json_type_name(other)
        ))),
    }
}

/// Dimensions of a nested array, without validating leaf types
fn shape_of(value: &Value) -> Result<Vec<usize>> {
    match value {
        Value::Array(items) => {
            let mut dims = vec![items.len()];
            if let Some(first) = items.first() {
                dims.extend(shape_of(first)?);
            }
            Ok(dims)
        }
        _ => Ok(Vec::new()),
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

/// Model output converted to plain nested JSON numbers.
///
/// The nesting follows the shape of the graph's output tensor, so a
/// classifier emitting one label per row yields e.g. `[0]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Prediction(Value);

impl Prediction {
    /// Wrap an already-converted output value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the underlying JSON value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the underlying JSON value
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Response body of the scoring endpoint.
///
/// Serializes to the prediction itself on success and to the bare string
/// `"error"` on failure. The error kind is kept for logs and headers but is
/// never part of the body.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreResponse {
    /// Successful inference
    Prediction(Prediction),

    /// Any request failure, with the error kind code
    Error { kind: &'static str },
}

impl ScoreResponse {
    /// Collapse an error into the sentinel response
    pub fn from_error(err: &Error) -> Self {
        Self::Error { kind: err.kind() }
    }

    /// Whether this response is the failure sentinel
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Error kind code, if this is a failure
    pub fn error_kind(&self) -> Option<&'static str> {
        match self {
            Self::Error { kind } => Some(*kind),
            Self::Prediction(_) => None,
        }
    }

    /// The prediction, if this is a success
    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            Self::Prediction(p) => Some(p),
            Self::Error { .. } => None,
        }
    }
}

impl From<Result<Prediction>> for ScoreResponse {
    fn from(result: Result<Prediction>) -> Self {
        match result {
            Ok(prediction) => Self::Prediction(prediction),
            Err(err) => Self::from_error(&err),
        }
    }
}

impl Serialize for ScoreResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Prediction(prediction) => prediction.serialize(serializer),
            Self::Error { .. } => serializer.serialize_str(ERROR_SENTINEL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_flat_payload() {
        let payload = RequestPayload::from_json(r#"{"data":[5.1,3.5,1.4,0.2,0.1,0.3]}"#).unwrap();
        assert_eq!(payload.features().unwrap(), vec![5.1, 3.5, 1.4, 0.2, 0.1, 0.3]);
    }

    #[test]
    fn test_nested_payload_flattens_row_major() {
        let payload = RequestPayload::from_json(r#"{"data":[[1,2,3],[4,5,6]]}"#).unwrap();
        assert_eq!(payload.features().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_extra_fields_ignored() {
        let payload = RequestPayload::from_json(r#"{"id":"abc","data":[1,2]}"#).unwrap();
        assert_eq!(payload.features().unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_not_json() {
        let err = RequestPayload::from_json("not json").unwrap_err();
        assert_eq!(err.kind(), "invalid_payload");
    }

    #[test]
    fn test_missing_data_field() {
        let err = RequestPayload::from_json(r#"{"features":[1,2,3,4,5,6]}"#).unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_top_level_array_rejected() {
        assert!(RequestPayload::from_json("[[1,2,3,4,5,6]]").is_err());
    }

    #[test]
    fn test_non_numeric_entries() {
        let payload = RequestPayload::from_json(r#"{"data":[1,2,"x",4,5,6]}"#).unwrap();
        assert!(payload.features().is_err());

        let payload = RequestPayload::from_json(r#"{"data":[1,2,null,4,5,6]}"#).unwrap();
        assert!(payload.features().is_err());

        let payload = RequestPayload::from_json(r#"{"data":[true,2,3,4,5,6]}"#).unwrap();
        assert!(payload.features().is_err());
    }

    #[test]
    fn test_ragged_array_rejected() {
        let payload = RequestPayload::from_json(r#"{"data":[[1,2],[3,4,5,6]]}"#).unwrap();
        let err = payload.features().unwrap_err();
        assert!(err.to_string().contains("ragged"));
    }

    #[test]
    fn test_scalar_data() {
        let payload = RequestPayload::from_json(r#"{"data":7}"#).unwrap();
        assert_eq!(payload.features().unwrap(), vec![7.0]);
    }

    #[test]
    fn test_response_serialization() {
        let ok = ScoreResponse::Prediction(Prediction::new(json!([0])));
        assert_eq!(serde_json::to_string(&ok).unwrap(), "[0]");

        let err = ScoreResponse::from_error(&Error::shape("expected 6"));
        assert_eq!(serde_json::to_string(&err).unwrap(), "\"error\"");
        assert_eq!(err.error_kind(), Some("shape"));
    }

    #[test]
    fn test_response_from_result() {
        let resp: ScoreResponse = Err(Error::inference("boom")).into();
        assert!(resp.is_error());

        let resp: ScoreResponse = Ok(Prediction::new(json!([[1]]))).into();
        assert_eq!(resp.prediction().unwrap().as_value(), &json!([[1]]));
    }

    proptest! {
        #[test]
        fn prop_rectangular_nesting_flattens(rows in 1usize..5, cols in 1usize..5) {
            let matrix: Vec<Vec<f64>> = (0..rows)
                .map(|r| (0..cols).map(|c| (r * cols + c) as f64).collect())
                .collect();
            let payload = RequestPayload::from_value(json!({ "data": matrix })).unwrap();
            let flat = payload.features().unwrap();
            prop_assert_eq!(flat.len(), rows * cols);
            prop_assert!(flat.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn prop_arbitrary_text_never_panics(raw in ".*") {
            let _ = RequestPayload::from_json(&raw).and_then(|p| p.features());
        }
    }
}
