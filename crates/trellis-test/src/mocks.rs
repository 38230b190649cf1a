//! Mock activators for testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use trellis_runtime::{Activator, UnitContext};

/// Ordered record of hook calls shared between activators.
///
/// Entries read `start:<label>` or `stop:<label>`.
#[derive(Debug, Clone, Default)]
pub struct ActivationLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl ActivationLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: String) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(entry);
        }
    }

    /// Snapshot of the entries so far.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Forget every entry.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.clear();
        }
    }
}

/// Activator that records its calls and always succeeds.
#[derive(Debug, Clone)]
pub struct RecordingActivator {
    label: String,
    log: ActivationLog,
}

impl RecordingActivator {
    /// Record calls under `label` into `log`.
    #[must_use]
    pub fn new(label: &str, log: &ActivationLog) -> Self {
        Self {
            label: label.to_string(),
            log: log.clone(),
        }
    }
}

#[async_trait]
impl Activator for RecordingActivator {
    async fn start(&self, _ctx: &UnitContext) -> anyhow::Result<()> {
        self.log.push(format!("start:{}", self.label));
        Ok(())
    }

    async fn stop(&self, _ctx: &UnitContext) -> anyhow::Result<()> {
        self.log.push(format!("stop:{}", self.label));
        Ok(())
    }
}

/// Activator whose hooks fail on demand.
#[derive(Debug, Clone, Default)]
pub struct FailingActivator {
    fail_start: bool,
    fail_stop: bool,
}

impl FailingActivator {
    /// Fail the start hook.
    #[must_use]
    pub fn on_start() -> Self {
        Self {
            fail_start: true,
            fail_stop: false,
        }
    }

    /// Fail the stop hook.
    #[must_use]
    pub fn on_stop() -> Self {
        Self {
            fail_start: false,
            fail_stop: true,
        }
    }
}

#[async_trait]
impl Activator for FailingActivator {
    async fn start(&self, ctx: &UnitContext) -> anyhow::Result<()> {
        if self.fail_start {
            anyhow::bail!("start hook failed for unit {}", ctx.unit());
        }
        Ok(())
    }

    async fn stop(&self, ctx: &UnitContext) -> anyhow::Result<()> {
        if self.fail_stop {
            anyhow::bail!("stop hook failed for unit {}", ctx.unit());
        }
        Ok(())
    }
}
