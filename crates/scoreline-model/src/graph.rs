//! Inference graph trait and the ONNX Runtime backend
//!
//! With the `onnx` feature (default) `OnnxGraph` executes the graph through
//! ONNX Runtime. Without it a stub is provided whose loader always fails, so
//! the rest of the crate builds and tests against mock graphs.

use crate::tensor::OutputTensor;
use ndarray::Array2;
use scoreline_core::Result;

/// A loaded computational graph with named input and output slots
pub trait InferenceGraph: Send + Sync {
    /// Declared input slot names, in graph order
    fn input_names(&self) -> &[String];

    /// Declared output slot names, in graph order
    fn output_names(&self) -> &[String];

    /// Bind `features` to `input`, execute, and read `output`
    fn run(&self, input: &str, output: &str, features: Array2<f32>) -> Result<OutputTensor>;
}

#[cfg(feature = "onnx")]
mod inner {
    use super::InferenceGraph;
    use crate::tensor::{OutputTensor, TensorData};
    use ndarray::Array2;
    use ort::session::Session;
    use ort::value::{DynValue, Tensor};
    use parking_lot::Mutex;
    use scoreline_core::{Error, Result};
    use std::path::{Path, PathBuf};

    /// An ONNX model loaded into ONNX Runtime.
    ///
    /// `Session::run` needs `&mut Session`, so calls are serialized.
    pub struct OnnxGraph {
        session: Mutex<Session>,
        inputs: Vec<String>,
        outputs: Vec<String>,
        path: PathBuf,
    }

    impl OnnxGraph {
        /// Load an ONNX model from a file path
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            if !path.exists() {
                return Err(Error::artifact(format!(
                    "Model file not found: {}",
                    path.display()
                )));
            }

            let session = Session::builder()
                .map_err(|e| Error::model(format!("ONNX session builder error: {}", e)))?
                .commit_from_file(path)
                .map_err(|e| {
                    Error::model(format!(
                        "Failed to load ONNX model '{}': {}",
                        path.display(),
                        e
                    ))
                })?;

            let inputs: Vec<String> = session
                .inputs()
                .iter()
                .map(|i| i.name().to_string())
                .collect();
            let outputs: Vec<String> = session
                .outputs()
                .iter()
                .map(|o| o.name().to_string())
                .collect();

            tracing::info!(
                path = %path.display(),
                inputs = ?inputs,
                outputs = ?outputs,
                "Loaded ONNX graph"
            );

            Ok(Self {
                session: Mutex::new(session),
                inputs,
                outputs,
                path: path.to_path_buf(),
            })
        }

        /// Path the graph was loaded from
        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl InferenceGraph for OnnxGraph {
        fn input_names(&self) -> &[String] {
            &self.inputs
        }

        fn output_names(&self) -> &[String] {
            &self.outputs
        }

        fn run(&self, input: &str, output: &str, features: Array2<f32>) -> Result<OutputTensor> {
            let (rows, cols) = features.dim();
            let data: Vec<f32> = features.iter().copied().collect();

            let tensor = Tensor::from_array((vec![rows as i64, cols as i64], data))
                .map_err(|e| Error::inference(format!("Tensor creation error: {}", e)))?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![input => tensor])
                .map_err(|e| Error::inference(format!("ONNX inference error: {}", e)))?;

            let value = outputs.get(output).ok_or_else(|| {
                Error::inference(format!("graph produced no output named '{}'", output))
            })?;

            extract(value)
        }
    }

    /// Copy an output value out of the session, trying each supported
    /// element type in turn.
    fn extract(value: &DynValue) -> Result<OutputTensor> {
        fn dims(shape: &[i64]) -> Vec<usize> {
            shape.iter().map(|&d| d.max(0) as usize).collect()
        }

        if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
            return OutputTensor::new(dims(shape), TensorData::I64(data.to_vec()));
        }
        if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
            return OutputTensor::new(dims(shape), TensorData::F32(data.to_vec()));
        }
        if let Ok((shape, data)) = value.try_extract_tensor::<f64>() {
            return OutputTensor::new(dims(shape), TensorData::F64(data.to_vec()));
        }
        if let Ok((shape, data)) = value.try_extract_tensor::<i32>() {
            return OutputTensor::new(dims(shape), TensorData::I32(data.to_vec()));
        }
        if let Ok((shape, data)) = value.try_extract_tensor::<bool>() {
            return OutputTensor::new(dims(shape), TensorData::Bool(data.to_vec()));
        }

        Err(Error::inference(
            "output is not a numeric tensor (expected i64, i32, f32, f64 or bool)",
        ))
    }
}

#[cfg(not(feature = "onnx"))]
mod inner {
    use super::InferenceGraph;
    use crate::tensor::OutputTensor;
    use ndarray::Array2;
    use scoreline_core::{Error, Result};
    use std::path::Path;

    /// Stub `OnnxGraph` when the `onnx` feature is not enabled
    pub struct OnnxGraph {
        inputs: Vec<String>,
        outputs: Vec<String>,
    }

    impl OnnxGraph {
        pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
            Err(Error::model(format!(
                "cannot load '{}': ONNX support requires the 'onnx' feature",
                path.as_ref().display()
            )))
        }
    }

    impl InferenceGraph for OnnxGraph {
        fn input_names(&self) -> &[String] {
            &self.inputs
        }

        fn output_names(&self) -> &[String] {
            &self.outputs
        }

        fn run(&self, _input: &str, _output: &str, _features: Array2<f32>) -> Result<OutputTensor> {
            Err(Error::model("ONNX support requires the 'onnx' feature"))
        }
    }
}

pub use inner::OnnxGraph;
