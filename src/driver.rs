use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::session::SessionController;

pub type SharedSession = Arc<Mutex<SessionController>>;

/// Runs the session clock on a background thread.
///
/// The UI and the driver share the session through one mutex; inference
/// itself happens on the worker thread, so the lock is only held for
/// bookkeeping and rendering.
pub struct SessionDriver {
    shared: SharedSession,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SessionDriver {
    pub fn spawn<F>(session: SessionController, on_frame: F) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(session));
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread = {
            let shared = shared.clone();
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("nca-driver".to_owned())
                .spawn(move || drive(&shared, &shutdown, on_frame))?
        };

        Ok(Self {
            shared,
            shutdown,
            thread: Some(thread),
        })
    }

    /// Locks the session for reading.
    pub fn session(&self) -> MutexGuard<'_, SessionController> {
        lock_session(&self.shared)
    }

    /// Runs a command against the session and wakes the driver so the
    /// change is scheduled without waiting out the current sleep.
    pub fn command<R>(&self, f: impl FnOnce(&mut SessionController, Instant) -> R) -> R {
        let result = {
            let mut session = lock_session(&self.shared);
            f(&mut session, Instant::now())
        };
        self.wake();
        result
    }

    fn wake(&self) {
        if let Some(thread) = &self.thread {
            thread.thread().unpark();
        }
    }
}

impl Drop for SessionDriver {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                tracing::error!("session driver panicked");
            }
        }
    }
}

fn drive<F: Fn()>(shared: &Mutex<SessionController>, shutdown: &AtomicBool, on_frame: F) {
    while !shutdown.load(Ordering::Acquire) {
        let wait = {
            let mut session = lock_session(shared);
            let now = Instant::now();
            if session.pump(now) {
                on_frame();
            }
            session.next_wakeup(now)
        };
        thread::park_timeout(wait);
    }
}

fn lock_session(lock: &Mutex<SessionController>) -> MutexGuard<'_, SessionController> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use crate::testing::FakeLoader;
    use crate::types::{SessionConfig, SpeedSetting};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn wait_for(driver: &SessionDriver, done: impl Fn(&SessionController) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done(&driver.session()) {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("driver did not reach condition");
    }

    #[test]
    fn drives_ticks_in_real_time() {
        let loader = FakeLoader::adding(1.0);
        let config = SessionConfig {
            speed: SpeedSetting(6),
            ..SessionConfig::default()
        };
        let session = SessionController::new(config, Arc::new(loader.clone()));
        let frames = Arc::new(AtomicUsize::new(0));
        let counter = frames.clone();
        let driver = SessionDriver::spawn(session, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        driver.command(|s, _| s.load_model("models/fake.onnx")).unwrap();
        wait_for(&driver, |s| s.steps() >= 5);
        assert!(frames.load(Ordering::SeqCst) >= 5);

        driver.command(|s, _| s.stop());
        let settled = driver.session().steps();
        thread::sleep(Duration::from_millis(50));
        // at most the step that was in flight when stopping lands
        assert!(driver.session().steps() <= settled + 1);
        assert_eq!(driver.session().status(), &SessionStatus::Ready);
    }

    #[test]
    fn drop_joins_idle_driver() {
        let session = SessionController::new(SessionConfig::default(), Arc::new(FakeLoader::default()));
        let driver = SessionDriver::spawn(session, || {}).unwrap();
        let started = Instant::now();
        drop(driver);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
