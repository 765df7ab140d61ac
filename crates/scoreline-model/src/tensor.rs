//! Graph output tensors and their conversion to plain JSON

use scoreline_core::{Error, Prediction, Result};
use serde_json::{Number, Value};

/// Element data of an output tensor, flattened row-major
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    I64(Vec<i64>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            Self::I64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_values(&self) -> Vec<Value> {
        match self {
            Self::I64(v) => v.iter().map(|&x| Value::from(x)).collect(),
            Self::I32(v) => v.iter().map(|&x| Value::from(x)).collect(),
            Self::F32(v) => v.iter().map(|&x| float(f64::from(x))).collect(),
            Self::F64(v) => v.iter().map(|&x| float(x)).collect(),
            Self::Bool(v) => v.iter().map(|&x| Value::from(x)).collect(),
        }
    }
}

/// Non-finite floats have no JSON form and become `null`
fn float(x: f64) -> Value {
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}

/// A tensor read from the graph's output slot
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl OutputTensor {
    /// Create a tensor, checking the shape covers exactly the data
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::inference(format!(
                "output shape {:?} holds {} elements but {} were returned",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// A 1-D label tensor, the usual classifier output
    pub fn labels(labels: Vec<i64>) -> Self {
        Self {
            shape: vec![labels.len()],
            data: TensorData::I64(labels),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Nest the flat data according to the shape
    pub fn to_prediction(&self) -> Prediction {
        let values = self.data.to_values();
        Prediction::new(nest(&self.shape, &values))
    }
}

fn nest(shape: &[usize], values: &[Value]) -> Value {
    match shape.split_first() {
        None => values.first().cloned().unwrap_or(Value::Null),
        Some((&outer, inner)) => {
            let stride: usize = inner.iter().product();
            Value::Array(
                (0..outer)
                    .map(|i| nest(inner, &values[i * stride..(i + 1) * stride]))
                    .collect(),
            )
        }
    }
}
