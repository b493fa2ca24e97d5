use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::{BackendError, ModelLoader};
use crate::engine::{StepEngine, TickDecision};
use crate::erase::EraseBrush;
use crate::grid::Grid;
use crate::mapping::{self, ChannelMapping};
use crate::types::{GridStats, SessionConfig, SpeedSetting};
use crate::worker::{InferenceWorker, WorkerEvent};

const BUSY_POLL: Duration = Duration::from_millis(1);
const IDLE_POLL: Duration = Duration::from_millis(250);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// No model requested yet.
    Empty,
    Loading,
    Ready,
    Failed(String),
}

/// Everything one visualization session owns: the backend worker, the
/// live grid, the step schedule and the current view.
pub struct SessionController {
    config: SessionConfig,
    loader: Arc<dyn ModelLoader>,
    worker: Option<InferenceWorker>,
    status: SessionStatus,
    model_path: Option<PathBuf>,
    grid: Option<Grid>,
    engine: StepEngine,
    generation: u64,
    mapping: ChannelMapping,
    preview: Option<ChannelMapping>,
    brush: EraseBrush,
    pending_erases: Vec<(i32, i32)>,
    pixels: Vec<u8>,
    frame: u64,
    steps: u64,
    discarded: u64,
    stats: GridStats,
}

impl SessionController {
    pub fn new(config: SessionConfig, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            engine: StepEngine::new(config.speed),
            brush: EraseBrush::new(config.erase_radius),
            config,
            loader,
            worker: None,
            status: SessionStatus::Empty,
            model_path: None,
            grid: None,
            generation: 0,
            mapping: ChannelMapping::default(),
            preview: None,
            pending_erases: Vec::new(),
            pixels: Vec::new(),
            frame: 0,
            steps: 0,
            discarded: 0,
            stats: GridStats::default(),
        }
    }

    /// Drops the current model and grid, then loads `path` on a fresh
    /// worker. Completion is reported through [`Self::pump`].
    pub fn load_model(&mut self, path: impl Into<PathBuf>) -> Result<(), BackendError> {
        let path = path.into();
        self.engine.stop();
        self.engine.complete();
        self.worker = None;
        self.grid = None;
        self.pending_erases.clear();
        self.generation += 1;
        self.steps = 0;
        self.stats = GridStats::default();
        self.model_path = Some(path.clone());
        self.status = SessionStatus::Loading;

        tracing::info!(path = %path.display(), "loading model");
        match InferenceWorker::spawn(self.loader.clone(), path, self.config.shape) {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(err) => {
                tracing::error!(%err, "could not start inference worker");
                self.status = SessionStatus::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Reseeds in place when a model is loaded, otherwise reloads the
    /// selected model.
    pub fn restart(&mut self, now: Instant) -> Result<(), BackendError> {
        self.engine.stop();

        let reusable = self.status == SessionStatus::Ready && self.worker.is_some();
        if let (true, Some(grid)) = (reusable, self.grid.as_mut()) {
            grid.reseed(&self.config.seed);
            self.stats = grid.stats();
            self.generation += 1;
            self.engine.complete();
            self.pending_erases.clear();
            self.steps = 0;
            self.render();
            tracing::info!("session reseeded");
            if self.config.autostart {
                self.start(now);
            }
            return Ok(());
        }

        match self.model_path.clone() {
            Some(path) => self.load_model(path),
            None => {
                tracing::warn!("restart requested with no model selected");
                Ok(())
            }
        }
    }

    /// Starts stepping. Refused unless a model is loaded.
    pub fn start(&mut self, now: Instant) -> bool {
        if !self.is_ready() || self.grid.is_none() {
            tracing::warn!(status = ?self.status, "no model session is ready, not starting");
            return false;
        }
        let started = self.engine.start(now);
        if started {
            tracing::info!(speed = self.engine.speed().0, "evolution started");
        }
        started
    }

    pub fn stop(&mut self) -> bool {
        let stopped = self.engine.stop();
        if stopped {
            tracing::info!("evolution stopped");
        }
        stopped
    }

    pub fn set_speed(&mut self, speed: SpeedSetting, now: Instant) {
        if speed == self.engine.speed() {
            return;
        }
        self.engine.set_speed(speed, now);
        tracing::info!(
            speed = speed.0,
            interval_ms = speed.interval().as_millis() as u64,
            "speed changed"
        );
    }

    pub fn set_mapping(&mut self, mapping: ChannelMapping) {
        self.mapping = mapping;
        self.preview = None;
        self.render();
    }

    /// Temporarily shows `mapping` until cleared with `None`.
    pub fn preview_mapping(&mut self, mapping: Option<ChannelMapping>) {
        if self.preview == mapping {
            return;
        }
        self.preview = mapping;
        self.render();
    }

    pub fn active_mapping(&self) -> ChannelMapping {
        self.preview.unwrap_or(self.mapping)
    }

    /// Clears the brush disc around `(cx, cy)` and redraws immediately.
    pub fn erase_at(&mut self, cx: i32, cy: i32) -> usize {
        let Some(grid) = self.grid.as_mut() else {
            return 0;
        };
        let cleared = self.brush.erase(grid, cx, cy);
        if self.engine.in_flight_since().is_some() {
            self.pending_erases.push((cx, cy));
        }
        self.render();
        cleared
    }

    /// Drains worker events, enforces the inference timeout and fires a
    /// due tick. Returns `true` when a new frame was rendered.
    pub fn pump(&mut self, now: Instant) -> bool {
        let mut produced = false;

        while let Some(event) = self.worker.as_ref().and_then(InferenceWorker::try_event) {
            match event {
                Ok(event) => produced |= self.handle_event(event, now),
                Err(err) => {
                    self.fail(err);
                    produced = true;
                }
            }
        }

        if let Some(since) = self.engine.in_flight_since() {
            let timeout = self.config.inference_timeout;
            if now.saturating_duration_since(since) > timeout {
                self.fail(BackendError::TimedOut(timeout));
                produced = true;
            }
        }

        match self.engine.poll(now) {
            TickDecision::Fire => self.submit_tick(),
            TickDecision::Skipped => {
                tracing::trace!(skipped = self.engine.skipped(), "tick skipped, step still in flight");
            }
            TickDecision::Idle => {}
        }

        produced
    }

    /// How long the driver may sleep before the next call to `pump`.
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        if self.status == SessionStatus::Loading || self.engine.in_flight_since().is_some() {
            return BUSY_POLL;
        }
        self.engine.time_until_due(now).unwrap_or(IDLE_POLL)
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn speed(&self) -> SpeedSetting {
        self.engine.speed()
    }

    pub fn mapping(&self) -> ChannelMapping {
        self.mapping
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// RGBA8 of the last render; empty before the first model loads.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Bumped on every render.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn skipped(&self) -> u64 {
        self.engine.skipped()
    }

    pub fn stats(&self) -> GridStats {
        self.stats
    }

    fn handle_event(&mut self, event: WorkerEvent, now: Instant) -> bool {
        match event {
            WorkerEvent::Loaded { input, output } => {
                tracing::info!(%input, %output, "model loaded");
                let grid = Grid::seeded(self.config.shape, &self.config.seed);
                self.stats = grid.stats();
                self.grid = Some(grid);
                self.status = SessionStatus::Ready;
                self.render();
                if self.config.autostart {
                    self.start(now);
                }
                true
            }
            WorkerEvent::LoadFailed(err) => {
                tracing::error!(%err, "error loading model");
                self.worker = None;
                self.grid = None;
                self.pixels.clear();
                self.status = SessionStatus::Failed(err.to_string());
                true
            }
            WorkerEvent::Stepped { generation, result } => {
                if generation != self.generation {
                    self.discarded += 1;
                    tracing::debug!(generation, "discarding step from before reseed");
                    return false;
                }
                self.engine.complete();
                match result {
                    Ok(grid) => {
                        self.adopt(grid);
                        true
                    }
                    Err(err) => {
                        tracing::error!(%err, "error during inference");
                        self.stop();
                        false
                    }
                }
            }
        }
    }

    fn adopt(&mut self, mut grid: Grid) {
        for (cx, cy) in self.pending_erases.drain(..) {
            self.brush.erase(&mut grid, cx, cy);
        }
        self.stats = grid.stats();
        self.steps += 1;
        self.grid = Some(grid);
        tracing::debug!(
            step = self.steps,
            mean = self.stats.mean,
            max = self.stats.max,
            min = self.stats.min,
            "step"
        );
        self.render();
    }

    fn submit_tick(&mut self) {
        let (Some(worker), Some(grid)) = (self.worker.as_ref(), self.grid.as_ref()) else {
            self.engine.complete();
            self.engine.stop();
            return;
        };
        self.pending_erases.clear();
        if let Err(err) = worker.submit(self.generation, grid.clone()) {
            self.fail(err);
        }
    }

    /// Abandons the backend after an unrecoverable error.
    fn fail(&mut self, err: BackendError) {
        tracing::error!(%err, "inference backend failed, session stopped");
        self.engine.stop();
        self.engine.complete();
        self.worker = None;
        self.status = SessionStatus::Failed(err.to_string());
    }

    fn render(&mut self) {
        let mapping = self.active_mapping();
        if let Some(grid) = &self.grid {
            mapping::render_into(grid, mapping, self.config.single_channel, &mut self.pixels);
            self.frame += 1;
        }
    }
}
