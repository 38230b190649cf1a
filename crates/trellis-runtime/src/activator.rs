//! Activation hooks.

use async_trait::async_trait;
use trellis_core::UnitId;

use crate::framework::Framework;

/// Start and stop hooks of a unit.
///
/// Hooks run with no framework lock held and may call back into any
/// lifecycle operation through [`UnitContext::framework`].
#[async_trait]
pub trait Activator: Send + Sync {
    /// Called when the unit moves from STARTING to ACTIVE. An error rolls the
    /// unit back to RESOLVED.
    async fn start(&self, ctx: &UnitContext) -> anyhow::Result<()>;

    /// Called when the unit moves from STOPPING to RESOLVED. Errors are
    /// logged and do not block the transition.
    async fn stop(&self, ctx: &UnitContext) -> anyhow::Result<()>;
}

/// What an activator sees of the framework.
#[derive(Clone)]
pub struct UnitContext {
    unit: UnitId,
    framework: Framework,
}

impl UnitContext {
    pub(crate) fn new(unit: UnitId, framework: Framework) -> Self {
        Self { unit, framework }
    }

    /// The unit being started or stopped.
    #[must_use]
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Handle to the running framework.
    #[must_use]
    pub fn framework(&self) -> &Framework {
        &self.framework
    }
}

impl std::fmt::Debug for UnitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitContext")
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}
