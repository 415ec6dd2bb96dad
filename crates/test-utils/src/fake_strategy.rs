use std::sync::{Arc, Mutex};

use launchkit::errors::{LaunchError, Result};
use launchkit::spawn::{SpawnOutcome, SpawnRequest, SpawnStrategy};

/// A spawn strategy that:
/// - records every request it receives
/// - "starts" nothing and reports a fixed pid, or fails when told to.
#[derive(Debug, Clone)]
pub struct FakeStrategy {
    pid: u32,
    start_time: Option<f64>,
    fail: bool,
    requests: Arc<Mutex<Vec<SpawnRequest>>>,
}

impl FakeStrategy {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            start_time: None,
            fail: false,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn requests(&self) -> Vec<SpawnRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl SpawnStrategy for FakeStrategy {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutcome> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(LaunchError::Spawn {
                program: request.executable.to_string_lossy().into_owned(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "fake spawn failure"),
            });
        }
        Ok(SpawnOutcome {
            pid: self.pid,
            child: None,
            start_time: self.start_time,
            output: None,
        })
    }
}
