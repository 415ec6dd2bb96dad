use std::sync::{Arc, Mutex};

use launchkit::hooks::{HookDescriptor, HookKind};

/// Shared log of hook executions, in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct HookLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl HookLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

/// A hook that appends its name to `log` when executed.
pub fn recording_hook(log: &HookLog, name: &str, kind: HookKind) -> HookDescriptor {
    let log = log.clone();
    let entry = name.to_string();
    HookDescriptor::from_fn(name, kind, move |_| {
        log.push(entry.clone());
        Ok(())
    })
}

/// A hook that records itself and then fails with `message`.
pub fn failing_hook(log: &HookLog, name: &str, kind: HookKind, message: &str) -> HookDescriptor {
    let log = log.clone();
    let entry = name.to_string();
    let message = message.to_string();
    HookDescriptor::from_fn(name, kind, move |_| {
        log.push(entry.clone());
        Err(anyhow::anyhow!(message.clone()))
    })
}
