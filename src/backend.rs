use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::GridShape;

/// A flat f32 buffer with its shape.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorData {
    pub dims: Vec<usize>,
    pub data: Vec<f32>,
}

impl TensorData {
    pub fn new(dims: Vec<usize>, data: Vec<f32>) -> Self {
        Self { dims, data }
    }
}

pub type TensorMap = BTreeMap<String, TensorData>;

/// A loaded model that can be stepped.
pub trait ModelSession {
    fn input_names(&self) -> &[String];
    fn output_names(&self) -> &[String];
    fn run(&mut self, feeds: TensorMap) -> Result<TensorMap, BackendError>;
}

/// Turns a model file into a runnable session.
///
/// Loaders are shared with worker threads, so they must be `Send + Sync`.
/// The session itself never leaves the thread that loaded it.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path, shape: GridShape) -> Result<Box<dyn ModelSession>, BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to load model {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model declares no {0} tensors")]
    NoTensors(&'static str),
    #[error("model output {0:?} missing from results")]
    MissingOutput(String),
    #[error("output shape {actual:?} does not match expected {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("output buffer holds {actual} values, shape implies {expected}")]
    Malformed { expected: usize, actual: usize },
    #[error("inference worker is gone")]
    Disconnected,
    #[error("inference did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Runs one step: feeds `input` under the session's first input name and
/// returns the tensor under its first output name.
pub fn run_step(session: &mut dyn ModelSession, input: TensorData) -> Result<TensorData, BackendError> {
    let input_name = session
        .input_names()
        .first()
        .cloned()
        .ok_or(BackendError::NoTensors("input"))?;
    let output_name = session
        .output_names()
        .first()
        .cloned()
        .ok_or(BackendError::NoTensors("output"))?;

    let mut feeds = TensorMap::new();
    feeds.insert(input_name, input);

    let mut results = session.run(feeds)?;
    results
        .remove(&output_name)
        .ok_or(BackendError::MissingOutput(output_name))
}
