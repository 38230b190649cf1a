//! The lifecycle state machine.
//!
//! [`Framework`] owns the revision graph behind one `RwLock`. Every
//! operation validates and mutates state under the write lock, queues its
//! notifications, releases the lock, publishes the notifications and only
//! then runs activator hooks. Hooks may therefore re-enter any lifecycle
//! operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use trellis_config::FrameworkSection;
use trellis_core::{RevisionId, UnitId};
use trellis_events::{EventBus, EventReceiver, FrameworkEvent, UnitEventKind};

use crate::activator::{Activator, UnitContext};
use crate::error::{RuntimeError, RuntimeResult};
use crate::graph::RevisionGraph;
use crate::manifest::{ManifestTranslator, TomlManifestTranslator};
use crate::resolver::{ResolveOutcome, Resolver, ResolverContext, ResolverHook, ResolverPolicy};
use crate::store::{StoreFile, UnitStore};
use crate::system;
use crate::unit::{Revision, UnitInfo, UnitState};
use crate::wiring::Wiring;

/// Builder for a [`Framework`].
pub struct FrameworkBuilder {
    section: FrameworkSection,
    translator: Arc<dyn ManifestTranslator>,
    activators: HashMap<String, Arc<dyn Activator>>,
    hook: Option<Arc<dyn ResolverHook>>,
    events: Option<EventBus>,
}

impl FrameworkBuilder {
    /// Start from a framework configuration section.
    #[must_use]
    pub fn new(section: FrameworkSection) -> Self {
        Self {
            section,
            translator: Arc::new(TomlManifestTranslator),
            activators: HashMap::new(),
            hook: None,
            events: None,
        }
    }

    /// Replace the default TOML manifest translator.
    #[must_use]
    pub fn translator(mut self, translator: impl ManifestTranslator + 'static) -> Self {
        self.translator = Arc::new(translator);
        self
    }

    /// Register an activator under `name`.
    #[must_use]
    pub fn activator(mut self, name: impl Into<String>, activator: impl Activator + 'static) -> Self {
        self.activators.insert(name.into(), Arc::new(activator));
        self
    }

    /// Register a shared activator under `name`.
    #[must_use]
    pub fn shared_activator(mut self, name: impl Into<String>, activator: Arc<dyn Activator>) -> Self {
        self.activators.insert(name.into(), activator);
        self
    }

    /// Install a resolver hook.
    #[must_use]
    pub fn resolver_hook(mut self, hook: impl ResolverHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Publish on an existing event bus.
    #[must_use]
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Create the system unit, restore persisted units and restart the ones
    /// that were active.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`] for invalid framework settings and
    /// [`RuntimeError::Store`] if the unit store cannot be read.
    pub async fn build(self) -> RuntimeResult<Framework> {
        let section = self.section;
        let policy = ResolverPolicy {
            bootstrap: system::bootstrap_import(&section)?,
            ee_aliases: section.ee_aliases.clone(),
            hook: self.hook,
        };

        let now = Utc::now();
        let mut graph = RevisionGraph::new();
        graph.insert_unit_with_id(
            UnitId::SYSTEM,
            system::SYSTEM_LOCATION,
            None,
            system::system_translation(&section)?,
            now,
            now,
        );
        graph.set_state(UnitId::SYSTEM, UnitState::Active, now);
        graph.commit_wirings(vec![Wiring::new(RevisionId::new(UnitId::SYSTEM, 0))]);

        let store = section.storage_dir.as_deref().map(UnitStore::new);
        let mut restore: Vec<(UnitId, UnitState)> = Vec::new();
        if let Some(store) = &store {
            if section.clean_start {
                info!(path = %store.path().display(), "Clean start, discarding stored units");
                store.clear()?;
            }
            let file = store.load_or_default()?;
            for unit in file.units {
                if unit.id.is_system() || graph.unit_at(&unit.location).is_some() {
                    warn!(unit_id = %unit.id, location = %unit.location, "Skipping duplicate stored unit");
                    continue;
                }
                graph.insert_unit_with_id(
                    unit.id,
                    &unit.location,
                    unit.activator,
                    unit.revision,
                    unit.installed_at,
                    unit.modified_at,
                );
                restore.push((unit.id, unit.state));
            }
            graph.set_next_unit_id(file.next_unit_id);
        }

        let events = self
            .events
            .unwrap_or_else(|| EventBus::with_capacity(section.event_capacity));
        let framework = Framework {
            inner: Arc::new(Inner {
                graph: RwLock::new(graph),
                events,
                translator: self.translator,
                policy,
                activators: self.activators,
                store,
                refresh_lock: Mutex::new(()),
                queued_refreshes: Mutex::new(Vec::new()),
            }),
        };
        framework.restore(&restore).await;
        Ok(framework)
    }
}

impl std::fmt::Debug for FrameworkBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkBuilder")
            .field("section", &self.section)
            .field("activators", &self.activators.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

pub(crate) struct Inner {
    pub(crate) graph: RwLock<RevisionGraph>,
    pub(crate) events: EventBus,
    pub(crate) translator: Arc<dyn ManifestTranslator>,
    pub(crate) policy: ResolverPolicy,
    pub(crate) activators: HashMap<String, Arc<dyn Activator>>,
    pub(crate) store: Option<UnitStore>,
    pub(crate) refresh_lock: Mutex<()>,
    /// Refresh requests made from hooks while a refresh was running.
    pub(crate) queued_refreshes: Mutex<Vec<Option<Vec<UnitId>>>>,
}

/// Handle to a running module framework.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct Framework {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framework")
            .field("policy", &self.inner.policy)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

impl Framework {
    /// Open a framework with the default translator and no activators,
    /// restoring any units persisted in the storage directory.
    ///
    /// # Errors
    ///
    /// See [`FrameworkBuilder::build`].
    pub async fn open(section: FrameworkSection) -> RuntimeResult<Self> {
        FrameworkBuilder::new(section).build().await
    }

    /// Start building a framework.
    #[must_use]
    pub fn builder(section: FrameworkSection) -> FrameworkBuilder {
        FrameworkBuilder::new(section)
    }

    /// The notification bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Subscribe to every notification.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    pub(crate) fn publish(&self, events: Vec<FrameworkEvent>) {
        self.inner.events.publish_all(events);
    }

    pub(crate) fn persist(&self, graph: &RevisionGraph) {
        if let Some(store) = &self.inner.store
            && let Err(e) = store.save(&StoreFile::snapshot(graph))
        {
            warn!(error = %e, "Failed to persist unit store");
        }
    }

    async fn restore(&self, units: &[(UnitId, UnitState)]) {
        if units.is_empty() {
            return;
        }
        let to_resolve: Vec<UnitId> = units
            .iter()
            .filter(|(_, s)| matches!(s, UnitState::Resolved | UnitState::Active))
            .map(|(id, _)| *id)
            .collect();
        for (unit, result) in self.resolve_units(&to_resolve).await {
            if let Err(e) = result {
                warn!(unit_id = %unit, error = %e, "Stored unit no longer resolves");
            }
        }
        for (unit, state) in units {
            if *state == UnitState::Active
                && let Err(e) = self.start(*unit).await
            {
                warn!(unit_id = %unit, error = %e, "Failed to restart stored unit");
            }
        }
        info!(units = units.len(), "Restored units from store");
    }

    /// Install a unit from raw manifest text.
    ///
    /// Installing a location that is already installed returns the existing
    /// unit without translating the manifest again. `activator` overrides the
    /// activator named by the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ManifestTranslation`] if the manifest is
    /// malformed.
    pub async fn install(
        &self,
        location: &str,
        raw_manifest: &str,
        activator: Option<&str>,
    ) -> RuntimeResult<UnitId> {
        if let Some(existing) = self.inner.graph.read().await.unit_at(location) {
            debug!(unit_id = %existing, location, "Location already installed");
            return Ok(existing);
        }

        let translation = self.inner.translator.translate(raw_manifest)?;
        let activator = activator
            .map(str::to_string)
            .or_else(|| translation.activator.clone());

        let mut graph = self.inner.graph.write().await;
        if let Some(existing) = graph.unit_at(location) {
            return Ok(existing);
        }
        let name = translation.symbolic_name.clone();
        let unit = graph.insert_unit(location, activator, translation, Utc::now());
        self.persist(&graph);
        drop(graph);

        info!(unit_id = %unit, location, symbolic_name = %name, "Unit installed");
        self.publish(vec![FrameworkEvent::unit(UnitEventKind::Installed, unit)]);
        Ok(unit)
    }

    /// Resolve and commit under an already held write lock.
    pub(crate) fn resolve_locked(
        &self,
        graph: &mut RevisionGraph,
        units: &[UnitId],
        events: &mut Vec<FrameworkEvent>,
    ) -> BTreeMap<UnitId, RuntimeResult<()>> {
        let mut results = BTreeMap::new();
        let mut targets = Vec::new();
        for unit in units {
            let Some(record) = graph.record(*unit) else {
                results.insert(*unit, Err(RuntimeError::UnitNotFound(*unit)));
                continue;
            };
            match record.current {
                Some(current) if graph.is_wired(current) => {
                    results.insert(*unit, Ok(()));
                },
                Some(current) => targets.push(current),
                None => {
                    results.insert(*unit, Err(RuntimeError::InvalidState {
                        unit: *unit,
                        state: record.state,
                        operation: "resolve",
                    }));
                },
            }
        }
        if targets.is_empty() {
            return results;
        }

        let report = Resolver::resolve(&ResolverContext::new(graph, &self.inner.policy), &targets);
        let newly_wired: Vec<RevisionId> = report.newly_wired().collect();
        graph.commit_wirings(report.wirings);
        for attachment in report.late_attachments {
            graph.attach_fragment(attachment.host, attachment.fragment);
        }

        let now = Utc::now();
        for revision in newly_wired {
            let unit = revision.unit;
            let promote = !graph.is_zombie(revision)
                && graph
                    .record(unit)
                    .is_some_and(|r| r.state == UnitState::Installed);
            if promote {
                graph.set_state(unit, UnitState::Resolved, now);
                info!(unit_id = %unit, revision = %revision, "Unit resolved");
                events.push(FrameworkEvent::unit(UnitEventKind::Resolved, unit));
            }
        }
        for (revision, outcome) in report.outcomes {
            let result = match outcome {
                ResolveOutcome::Wired => Ok(()),
                ResolveOutcome::Failed(e) => Err(RuntimeError::Resolve(e)),
            };
            results.insert(revision.unit, result);
        }
        results
    }

    /// Resolve one unit.
    ///
    /// A no-op when the current revision is already wired.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Resolve`] if the current revision cannot be
    /// wired; the unit and every other unit are left unchanged.
    pub async fn resolve(&self, unit: UnitId) -> RuntimeResult<()> {
        let mut results = self.resolve_units(&[unit]).await;
        results.remove(&unit).unwrap_or(Err(RuntimeError::UnitNotFound(unit)))
    }

    /// Resolve several units in one pass and report per unit.
    pub async fn resolve_units(&self, units: &[UnitId]) -> BTreeMap<UnitId, RuntimeResult<()>> {
        let mut events = Vec::new();
        let results = {
            let mut graph = self.inner.graph.write().await;
            let results = self.resolve_locked(&mut graph, units, &mut events);
            if !events.is_empty() {
                self.persist(&graph);
            }
            results
        };
        self.publish(events);
        results
    }

    /// Start a unit, resolving it first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::FragmentNotStartable`] for fragments,
    /// [`RuntimeError::Resolve`] if the unit cannot be resolved and
    /// [`RuntimeError::Activation`] if the start hook fails, in which case
    /// the unit is back in RESOLVED.
    pub async fn start(&self, unit: UnitId) -> RuntimeResult<()> {
        if unit.is_system() {
            return Ok(());
        }
        let mut events = Vec::new();
        let activator = {
            let mut graph = self.inner.graph.write().await;
            let record = graph.record(unit).ok_or(RuntimeError::UnitNotFound(unit))?;
            match record.state {
                UnitState::Active => return Ok(()),
                state @ (UnitState::Starting | UnitState::Stopping | UnitState::Uninstalled) => {
                    return Err(RuntimeError::InvalidState {
                        unit,
                        state,
                        operation: "start",
                    });
                },
                UnitState::Installed | UnitState::Resolved => {},
            }
            if graph.current_revision(unit).is_some_and(|r| r.is_fragment()) {
                return Err(RuntimeError::FragmentNotStartable { unit });
            }
            let activator = record.activator.clone();

            let mut resolved = self.resolve_locked(&mut graph, &[unit], &mut events);
            if let Some(Err(e)) = resolved.remove(&unit) {
                drop(graph);
                self.publish(events);
                return Err(e);
            }

            graph.set_state(unit, UnitState::Starting, Utc::now());
            events.push(FrameworkEvent::unit(UnitEventKind::Starting, unit));
            activator
        };
        self.publish(events);

        let outcome = match activator {
            None => Ok(()),
            Some(name) => self.run_start_hook(unit, &name).await,
        };

        let mut events = Vec::new();
        {
            let mut graph = self.inner.graph.write().await;
            let still_starting = graph
                .record(unit)
                .is_some_and(|r| r.state == UnitState::Starting);
            if still_starting {
                let now = Utc::now();
                match &outcome {
                    Ok(()) => {
                        graph.set_state(unit, UnitState::Active, now);
                        info!(unit_id = %unit, "Unit started");
                        events.push(FrameworkEvent::unit(UnitEventKind::Started, unit));
                    },
                    Err(e) => {
                        graph.set_state(unit, UnitState::Resolved, now);
                        warn!(unit_id = %unit, error = %e, "Unit failed to start");
                        events.push(FrameworkEvent::Error {
                            unit,
                            message: e.to_string(),
                        });
                    },
                }
                self.persist(&graph);
            }
        }
        self.publish(events);
        outcome
    }

    async fn run_start_hook(&self, unit: UnitId, name: &str) -> RuntimeResult<()> {
        let Some(activator) = self.inner.activators.get(name).cloned() else {
            return Err(RuntimeError::Activation {
                unit,
                message: format!("no activator registered under '{name}'"),
            });
        };
        let ctx = UnitContext::new(unit, self.clone());
        activator
            .start(&ctx)
            .await
            .map_err(|e| RuntimeError::Activation {
                unit,
                message: format!("{e:#}"),
            })
    }

    /// Run a stop hook. Failures are logged and reported as an error event.
    pub(crate) async fn run_stop_hook(&self, unit: UnitId, name: Option<&str>) {
        let Some(name) = name else {
            return;
        };
        let message = match self.inner.activators.get(name).cloned() {
            None => format!("no activator registered under '{name}'"),
            Some(activator) => {
                let ctx = UnitContext::new(unit, self.clone());
                match activator.stop(&ctx).await {
                    Ok(()) => return,
                    Err(e) => format!("{e:#}"),
                }
            },
        };
        warn!(unit_id = %unit, error = %message, "Stop hook failed");
        self.publish(vec![FrameworkEvent::Error { unit, message }]);
    }

    /// Stop an active unit. Stopping a unit that is not active is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SystemUnit`] for unit `0` and
    /// [`RuntimeError::InvalidState`] while the unit is starting, stopping
    /// or uninstalled.
    pub async fn stop(&self, unit: UnitId) -> RuntimeResult<()> {
        if unit.is_system() {
            return Err(RuntimeError::SystemUnit { operation: "stop" });
        }
        let activator = {
            let mut graph = self.inner.graph.write().await;
            let record = graph.record(unit).ok_or(RuntimeError::UnitNotFound(unit))?;
            match record.state {
                UnitState::Active => {},
                UnitState::Installed | UnitState::Resolved => return Ok(()),
                state @ (UnitState::Starting | UnitState::Stopping | UnitState::Uninstalled) => {
                    return Err(RuntimeError::InvalidState {
                        unit,
                        state,
                        operation: "stop",
                    });
                },
            }
            let activator = record.activator.clone();
            graph.set_state(unit, UnitState::Stopping, Utc::now());
            activator
        };
        self.publish(vec![FrameworkEvent::unit(UnitEventKind::Stopping, unit)]);

        self.run_stop_hook(unit, activator.as_deref()).await;

        let mut events = Vec::new();
        {
            let mut graph = self.inner.graph.write().await;
            if graph
                .record(unit)
                .is_some_and(|r| r.state == UnitState::Stopping)
            {
                graph.set_state(unit, UnitState::Resolved, Utc::now());
                self.persist(&graph);
                info!(unit_id = %unit, "Unit stopped");
                events.push(FrameworkEvent::unit(UnitEventKind::Stopped, unit));
            }
        }
        self.publish(events);
        Ok(())
    }

    /// Replace a unit's content with a new revision.
    ///
    /// The previous revision stays as a zombie until the next refresh if it
    /// is wired; an unwired previous revision is removed at once. The unit's
    /// state does not change.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ManifestTranslation`] for a malformed manifest
    /// and [`RuntimeError::SystemUnit`] for unit `0`.
    pub async fn update(&self, unit: UnitId, raw_manifest: &str) -> RuntimeResult<RevisionId> {
        if unit.is_system() {
            return Err(RuntimeError::SystemUnit { operation: "update" });
        }
        self.check_installed(unit, "update").await?;
        let translation = self.inner.translator.translate(raw_manifest)?;

        let mut events = Vec::new();
        let revision = {
            let mut graph = self.inner.graph.write().await;
            if let Some(record) = graph.record_mut(unit)
                && let Some(activator) = &translation.activator
            {
                record.activator = Some(activator.clone());
            }
            let (revision, previous) = graph
                .insert_revision(unit, translation, Utc::now())
                .ok_or(RuntimeError::UnitNotFound(unit))?;
            if let Some(previous) = previous
                && !graph.is_wired(previous)
                && graph.retire_revision(previous)
            {
                debug!(revision = %previous, "Unwired revision removed on update");
                events.push(FrameworkEvent::RevisionRemoved { revision: previous });
            }
            self.persist(&graph);
            revision
        };
        info!(unit_id = %unit, revision = %revision, "Unit updated");
        events.push(FrameworkEvent::unit(UnitEventKind::Updated, unit));
        self.publish(events);
        Ok(revision)
    }

    async fn check_installed(&self, unit: UnitId, operation: &'static str) -> RuntimeResult<()> {
        let graph = self.inner.graph.read().await;
        let record = graph.record(unit).ok_or(RuntimeError::UnitNotFound(unit))?;
        if record.state == UnitState::Uninstalled {
            return Err(RuntimeError::InvalidState {
                unit,
                state: record.state,
                operation,
            });
        }
        Ok(())
    }

    /// Uninstall a unit.
    ///
    /// The unit is UNINSTALLED immediately and leaves the resolvable
    /// universe. Wired revisions stay until the next refresh. An active
    /// unit's stop hook runs afterwards on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SystemUnit`] for unit `0` and
    /// [`RuntimeError::InvalidState`] if already uninstalled.
    pub async fn uninstall(&self, unit: UnitId) -> RuntimeResult<()> {
        if unit.is_system() {
            return Err(RuntimeError::SystemUnit {
                operation: "uninstall",
            });
        }
        let mut events = Vec::new();
        let stop_hook = {
            let mut graph = self.inner.graph.write().await;
            let record = graph.record(unit).ok_or(RuntimeError::UnitNotFound(unit))?;
            if record.state == UnitState::Uninstalled {
                return Err(RuntimeError::InvalidState {
                    unit,
                    state: record.state,
                    operation: "uninstall",
                });
            }
            let was_active = record.state == UnitState::Active;
            let activator = record.activator.clone();

            let previous = graph.mark_zombie(unit, Utc::now());
            if let Some(previous) = previous
                && !graph.is_wired(previous)
                && graph.retire_revision(previous)
            {
                events.push(FrameworkEvent::RevisionRemoved { revision: previous });
            }
            self.persist(&graph);
            was_active.then_some(activator)
        };
        info!(unit_id = %unit, "Unit uninstalled");
        events.push(FrameworkEvent::unit(UnitEventKind::Uninstalled, unit));
        self.publish(events);

        if let Some(activator) = stop_hook {
            self.run_stop_hook(unit, activator.as_deref()).await;
        }
        Ok(())
    }

    /// Stop every active unit, highest id first.
    pub async fn shutdown(&self) {
        let active: Vec<UnitId> = self
            .inner
            .graph
            .read()
            .await
            .records()
            .filter(|r| r.state == UnitState::Active && !r.id.is_system())
            .map(|r| r.id)
            .collect();
        for unit in active.into_iter().rev() {
            if let Err(e) = self.stop(unit).await {
                warn!(unit_id = %unit, error = %e, "Failed to stop unit during shutdown");
            }
        }
        info!("Framework shut down");
    }

    /// Lifecycle state of a unit.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnitNotFound`] if the unit is not registered.
    pub async fn state(&self, unit: UnitId) -> RuntimeResult<UnitState> {
        self.inner
            .graph
            .read()
            .await
            .record(unit)
            .map(|r| r.state)
            .ok_or(RuntimeError::UnitNotFound(unit))
    }

    /// The committed wiring of a revision.
    pub async fn wiring(&self, revision: RevisionId) -> Option<Wiring> {
        self.inner.graph.read().await.wiring(revision).cloned()
    }

    /// Revisions wired to capabilities of `revision`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::RevisionNotFound`] if the revision has been
    /// removed or never existed.
    pub async fn dependents(&self, revision: RevisionId) -> RuntimeResult<Vec<RevisionId>> {
        let graph = self.inner.graph.read().await;
        if graph.revision(revision).is_none() {
            return Err(RuntimeError::RevisionNotFound(revision));
        }
        Ok(graph.dependents(revision))
    }

    /// Revisions visible to `revision` through required units, following
    /// re-exports.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::RevisionNotFound`] if the revision has been
    /// removed or never existed.
    pub async fn visible_bundles(&self, revision: RevisionId) -> RuntimeResult<Vec<RevisionId>> {
        let graph = self.inner.graph.read().await;
        if graph.revision(revision).is_none() {
            return Err(RuntimeError::RevisionNotFound(revision));
        }
        Ok(graph.visible_bundles(revision))
    }

    /// The current revision of a unit.
    pub async fn current_revision(&self, unit: UnitId) -> Option<Arc<Revision>> {
        self.inner.graph.read().await.current_revision(unit).cloned()
    }

    /// Look up any revision, current or zombie.
    pub async fn revision(&self, revision: RevisionId) -> Option<Arc<Revision>> {
        self.inner.graph.read().await.revision(revision).cloned()
    }

    /// Every revision of a unit still present, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnitNotFound`] if the unit is not registered.
    pub async fn revisions(&self, unit: UnitId) -> RuntimeResult<Vec<Arc<Revision>>> {
        let graph = self.inner.graph.read().await;
        let record = graph.record(unit).ok_or(RuntimeError::UnitNotFound(unit))?;
        Ok(record
            .revisions
            .iter()
            .filter_map(|id| graph.revision(*id).cloned())
            .collect())
    }

    /// Every revision in the framework, in id order.
    pub async fn all_revisions(&self) -> Vec<Arc<Revision>> {
        self.inner
            .graph
            .read()
            .await
            .all_revisions()
            .cloned()
            .collect()
    }

    /// Snapshot of one unit.
    pub async fn unit(&self, unit: UnitId) -> Option<UnitInfo> {
        self.inner.graph.read().await.unit(unit)
    }

    /// Snapshot of every registered unit, the system unit included.
    pub async fn units(&self) -> Vec<UnitInfo> {
        self.inner.graph.read().await.units()
    }

    /// The unit installed from `location`.
    pub async fn unit_at(&self, location: &str) -> Option<UnitId> {
        self.inner.graph.read().await.unit_at(location)
    }

    /// Units with revisions awaiting removal by a refresh.
    pub async fn removal_pending(&self) -> Vec<UnitId> {
        self.inner.graph.read().await.removal_pending()
    }
}
