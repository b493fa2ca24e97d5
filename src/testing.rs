//! In-process backends for exercising the session without model files.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{BackendError, ModelLoader, ModelSession, TensorData, TensorMap};
use crate::types::GridShape;

/// Adds `increment` to every value on each step.
#[derive(Clone, Default)]
pub struct FakeLoader {
    pub loads: Arc<AtomicUsize>,
    pub runs: Arc<AtomicUsize>,
    pub fail_load: bool,
    /// Runs with an index at or past this value fail.
    pub fail_from_run: Option<usize>,
    pub run_delay: Option<Duration>,
    pub increment: f32,
}

impl FakeLoader {
    pub fn adding(increment: f32) -> Self {
        Self {
            increment,
            ..Self::default()
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, path: &Path, _shape: GridShape) -> Result<Box<dyn ModelSession>, BackendError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(BackendError::Load {
                path: path.to_path_buf(),
                reason: "refused by fake loader".to_owned(),
            });
        }
        Ok(Box::new(FakeSession {
            loader: self.clone(),
            inputs: vec!["input".to_owned()],
            outputs: vec!["output".to_owned()],
        }))
    }
}

struct FakeSession {
    loader: FakeLoader,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl ModelSession for FakeSession {
    fn input_names(&self) -> &[String] {
        &self.inputs
    }

    fn output_names(&self) -> &[String] {
        &self.outputs
    }

    fn run(&mut self, mut feeds: TensorMap) -> Result<TensorMap, BackendError> {
        let run = self.loader.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.loader.run_delay {
            std::thread::sleep(delay);
        }
        if self.loader.fail_from_run.is_some_and(|limit| run >= limit) {
            return Err(BackendError::Inference("fake failure".to_owned()));
        }

        let input = feeds
            .remove("input")
            .ok_or_else(|| BackendError::Inference("missing feed".to_owned()))?;
        let data = input.data.iter().map(|v| v + self.loader.increment).collect();

        let mut out = TensorMap::new();
        out.insert("output".to_owned(), TensorData::new(input.dims, data));
        Ok(out)
    }
}
