use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use crate::backend::{self, BackendError, ModelLoader};
use crate::grid::Grid;
use crate::types::GridShape;

struct StepJob {
    generation: u64,
    grid: Grid,
}

pub enum WorkerEvent {
    Loaded {
        input: String,
        output: String,
    },
    LoadFailed(BackendError),
    Stepped {
        generation: u64,
        result: Result<Grid, BackendError>,
    },
}

/// Owns one loaded model on a dedicated thread and runs steps serially.
///
/// Dropping the worker closes its job queue; the thread exits once the
/// step it is running (if any) returns. Nothing joins the thread, so a step
/// that never returns keeps its thread and model alive after the session
/// has timed out and moved on.
pub struct InferenceWorker {
    jobs: Sender<StepJob>,
    events: Receiver<WorkerEvent>,
}

impl InferenceWorker {
    pub fn spawn(
        loader: Arc<dyn ModelLoader>,
        path: PathBuf,
        shape: GridShape,
    ) -> Result<Self, BackendError> {
        let (job_tx, job_rx) = mpsc::channel::<StepJob>();
        let (event_tx, event_rx) = mpsc::channel();

        thread::Builder::new()
            .name("nca-inference".to_owned())
            .spawn(move || serve(loader.as_ref(), &path, shape, job_rx, event_tx))
            .map_err(|err| BackendError::Inference(format!("failed to spawn worker: {err}")))?;

        Ok(Self {
            jobs: job_tx,
            events: event_rx,
        })
    }

    pub fn submit(&self, generation: u64, grid: Grid) -> Result<(), BackendError> {
        self.jobs
            .send(StepJob { generation, grid })
            .map_err(|_| BackendError::Disconnected)
    }

    /// Next pending event without blocking. A dead worker yields a
    /// `Disconnected` error once per call.
    pub fn try_event(&self) -> Option<Result<WorkerEvent, BackendError>> {
        match self.events.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(BackendError::Disconnected)),
        }
    }
}

fn serve(
    loader: &dyn ModelLoader,
    path: &Path,
    shape: GridShape,
    jobs: Receiver<StepJob>,
    events: Sender<WorkerEvent>,
) {
    let mut session = match loader.load(path, shape) {
        Ok(session) => session,
        Err(err) => {
            let _ = events.send(WorkerEvent::LoadFailed(err));
            return;
        }
    };

    let (Some(input), Some(output)) = (
        session.input_names().first().cloned(),
        session.output_names().first().cloned(),
    ) else {
        let _ = events.send(WorkerEvent::LoadFailed(BackendError::Load {
            path: path.to_path_buf(),
            reason: "model has no inputs or no outputs".to_owned(),
        }));
        return;
    };

    if events.send(WorkerEvent::Loaded { input, output }).is_err() {
        return;
    }

    for job in jobs {
        let result = backend::run_step(session.as_mut(), job.grid.into_tensor())
            .and_then(|tensor| Grid::from_tensor(tensor, shape));
        let event = WorkerEvent::Stepped {
            generation: job.generation,
            result,
        };
        if events.send(event).is_err() {
            tracing::debug!("session dropped, inference worker exiting");
            return;
        }
    }
}
