//! Lifecycle transitions, activation hooks and notifications.

use std::sync::Arc;

use async_trait::async_trait;
use trellis_core::{RevisionId, UnitId};
use trellis_events::{FrameworkEvent, UnitEventKind};
use trellis_runtime::{Activator, Framework, ResolveError, RuntimeError, UnitContext, UnitState};
use trellis_test::{
    ActivationLog, FailingActivator, ManifestBuilder, RecordingActivator, test_framework,
    test_section,
};

fn event_types(events: &[Arc<FrameworkEvent>]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type()).collect()
}

#[tokio::test]
async fn test_install_same_location_returns_existing_unit() {
    let framework = test_framework().await;
    let raw = ManifestBuilder::unit("a").build();

    let first = framework.install("mem:a", &raw, None).await.unwrap();
    let second = framework.install("mem:a", "not even toml", None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(framework.state(first).await.unwrap(), UnitState::Installed);
    assert_eq!(framework.revisions(first).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_install_rejects_malformed_manifest() {
    let framework = test_framework().await;
    let err = framework.install("mem:bad", "[unit]\n", None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::ManifestTranslation { .. }));
    assert_eq!(framework.units().await.len(), 1);
}

#[tokio::test]
async fn test_start_and_stop_run_hooks() {
    let log = ActivationLog::new();
    let framework = Framework::builder(test_section())
        .activator("rec", RecordingActivator::new("a", &log))
        .build()
        .await
        .unwrap();
    let unit = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), Some("rec"))
        .await
        .unwrap();

    framework.start(unit).await.unwrap();
    assert_eq!(framework.state(unit).await.unwrap(), UnitState::Active);
    framework.start(unit).await.unwrap();

    framework.stop(unit).await.unwrap();
    assert_eq!(framework.state(unit).await.unwrap(), UnitState::Resolved);
    framework.stop(unit).await.unwrap();

    assert_eq!(log.entries(), vec!["start:a", "stop:a"]);
}

#[tokio::test]
async fn test_manifest_names_activator() {
    let log = ActivationLog::new();
    let framework = Framework::builder(test_section())
        .activator("from-manifest", RecordingActivator::new("m", &log))
        .build()
        .await
        .unwrap();
    let raw = ManifestBuilder::unit("m").activator("from-manifest").build();
    let unit = framework.install("mem:m", &raw, None).await.unwrap();

    framework.start(unit).await.unwrap();

    assert_eq!(log.entries(), vec!["start:m"]);
}

#[tokio::test]
async fn test_start_emits_transition_events_in_order() {
    let framework = test_framework().await;
    let mut events = framework.subscribe();

    let unit = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), None)
        .await
        .unwrap();
    framework.start(unit).await.unwrap();
    framework.stop(unit).await.unwrap();

    let drained = events.drain();
    assert_eq!(
        event_types(&drained),
        vec!["installed", "resolved", "starting", "started", "stopping", "stopped"]
    );
    assert!(drained.iter().all(|e| e.unit_id() == Some(unit)));
}

#[tokio::test]
async fn test_failed_start_hook_returns_to_resolved() {
    let framework = Framework::builder(test_section())
        .activator("fail", FailingActivator::on_start())
        .build()
        .await
        .unwrap();
    let unit = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), Some("fail"))
        .await
        .unwrap();
    let mut events = framework.subscribe();

    let err = framework.start(unit).await.unwrap_err();

    assert!(matches!(err, RuntimeError::Activation { unit: u, .. } if u == unit));
    assert_eq!(framework.state(unit).await.unwrap(), UnitState::Resolved);
    let types = event_types(&events.drain());
    assert_eq!(types, vec!["resolved", "starting", "error"]);
}

#[tokio::test]
async fn test_unknown_activator_fails_start() {
    let framework = test_framework().await;
    let unit = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), Some("missing"))
        .await
        .unwrap();

    let err = framework.start(unit).await.unwrap_err();

    assert!(err.to_string().contains("missing"));
    assert_eq!(framework.state(unit).await.unwrap(), UnitState::Resolved);
}

#[tokio::test]
async fn test_failed_stop_hook_does_not_block() {
    let framework = Framework::builder(test_section())
        .activator("fail", FailingActivator::on_stop())
        .build()
        .await
        .unwrap();
    let unit = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), Some("fail"))
        .await
        .unwrap();
    framework.start(unit).await.unwrap();
    let mut events = framework.subscribe();

    framework.stop(unit).await.unwrap();

    assert_eq!(framework.state(unit).await.unwrap(), UnitState::Resolved);
    assert_eq!(
        event_types(&events.drain()),
        vec!["stopping", "error", "stopped"]
    );
}

#[tokio::test]
async fn test_unresolvable_start_stays_installed() {
    let framework = test_framework().await;
    let unit = framework
        .install(
            "mem:a",
            &ManifestBuilder::unit("a").import("absent", None).build(),
            None,
        )
        .await
        .unwrap();

    let err = framework.start(unit).await.unwrap_err();

    assert!(matches!(err, RuntimeError::Resolve(_)));
    assert_eq!(framework.state(unit).await.unwrap(), UnitState::Installed);
}

#[tokio::test]
async fn test_fragment_cannot_start() {
    let framework = test_framework().await;
    framework
        .install("mem:host", &ManifestBuilder::unit("host").build(), None)
        .await
        .unwrap();
    let fragment = framework
        .install(
            "mem:frag",
            &ManifestBuilder::unit("frag").fragment_of("host", None).build(),
            None,
        )
        .await
        .unwrap();

    let err = framework.start(fragment).await.unwrap_err();
    assert!(matches!(err, RuntimeError::FragmentNotStartable { .. }));
}

#[tokio::test]
async fn test_system_unit_is_fixed() {
    let framework = test_framework().await;

    assert_eq!(framework.state(UnitId::SYSTEM).await.unwrap(), UnitState::Active);
    framework.start(UnitId::SYSTEM).await.unwrap();
    assert!(matches!(
        framework.stop(UnitId::SYSTEM).await,
        Err(RuntimeError::SystemUnit { .. })
    ));
    assert!(matches!(
        framework.update(UnitId::SYSTEM, "").await,
        Err(RuntimeError::SystemUnit { .. })
    ));
    assert!(matches!(
        framework.uninstall(UnitId::SYSTEM).await,
        Err(RuntimeError::SystemUnit { .. })
    ));
    let system = framework.unit(UnitId::SYSTEM).await.unwrap();
    assert_eq!(system.location, trellis_runtime::SYSTEM_LOCATION);
}

#[tokio::test]
async fn test_unknown_unit_is_reported() {
    let framework = test_framework().await;
    assert!(matches!(
        framework.state(UnitId(42)).await,
        Err(RuntimeError::UnitNotFound(UnitId(42)))
    ));
    assert!(matches!(
        framework.resolve(UnitId(42)).await,
        Err(RuntimeError::UnitNotFound(_))
    ));
    assert!(framework.start(UnitId(42)).await.is_err());
}

#[tokio::test]
async fn test_update_keeps_wired_revision_until_refresh() {
    let framework = test_framework().await;
    let provider = framework
        .install("mem:a", &ManifestBuilder::unit("a").export("p", "1.0.0").build(), None)
        .await
        .unwrap();
    let client = framework
        .install("mem:b", &ManifestBuilder::unit("b").import("p", None).build(), None)
        .await
        .unwrap();
    framework.resolve(client).await.unwrap();

    let old = RevisionId::new(provider, 0);
    let new = framework
        .update(provider, &ManifestBuilder::unit("a").version("2.0.0").export("p", "2.0.0").build())
        .await
        .unwrap();

    assert_eq!(new, RevisionId::new(provider, 1));
    assert_eq!(framework.state(provider).await.unwrap(), UnitState::Resolved);
    assert!(framework.revision(old).await.is_some());
    assert!(framework.wiring(old).await.unwrap().is_in_use());
    assert!(framework.wiring(new).await.is_none());
    assert_eq!(framework.removal_pending().await, vec![provider]);
    assert!(framework.unit(provider).await.unwrap().removal_pending());

    let client_wiring = framework
        .wiring(RevisionId::new(client, 0))
        .await
        .unwrap();
    assert!(client_wiring.providers().contains(&old));
}

#[tokio::test]
async fn test_update_of_unwired_revision_drops_it() {
    let framework = test_framework().await;
    let unit = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), None)
        .await
        .unwrap();
    let mut events = framework.subscribe();

    framework
        .update(unit, &ManifestBuilder::unit("a").version("1.1.0").build())
        .await
        .unwrap();

    let revisions = framework.revisions(unit).await.unwrap();
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].version().to_string(), "1.1.0");
    let drained = events.drain();
    assert_eq!(
        drained[0].as_ref(),
        &FrameworkEvent::RevisionRemoved {
            revision: RevisionId::new(unit, 0)
        }
    );
    assert_eq!(
        drained[1].as_ref(),
        &FrameworkEvent::unit(UnitEventKind::Updated, unit)
    );
    assert!(framework.removal_pending().await.is_empty());
}

#[tokio::test]
async fn test_update_rejects_malformed_manifest() {
    let framework = test_framework().await;
    let unit = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), None)
        .await
        .unwrap();

    assert!(framework.update(unit, "[unit").await.is_err());
    assert_eq!(framework.revisions(unit).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_uninstall_active_unit_runs_stop_hook() {
    let log = ActivationLog::new();
    let framework = Framework::builder(test_section())
        .activator("rec", RecordingActivator::new("a", &log))
        .build()
        .await
        .unwrap();
    let unit = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), Some("rec"))
        .await
        .unwrap();
    framework.start(unit).await.unwrap();

    framework.uninstall(unit).await.unwrap();

    assert_eq!(log.entries(), vec!["start:a", "stop:a"]);
    assert_eq!(framework.state(unit).await.unwrap(), UnitState::Uninstalled);
    assert!(framework.unit_at("mem:a").await.is_none());
    assert!(matches!(
        framework.uninstall(unit).await,
        Err(RuntimeError::InvalidState { .. })
    ));
    assert!(matches!(
        framework.start(unit).await,
        Err(RuntimeError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_uninstall_unwired_unit_removes_it() {
    let framework = test_framework().await;
    let unit = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), None)
        .await
        .unwrap();
    let mut events = framework.subscribe();

    framework.uninstall(unit).await.unwrap();

    assert!(framework.unit(unit).await.is_none());
    assert_eq!(
        event_types(&events.drain()),
        vec!["revision_removed", "uninstalled"]
    );

    let again = framework
        .install("mem:a", &ManifestBuilder::unit("a").build(), None)
        .await
        .unwrap();
    assert_ne!(again, unit);
}

#[tokio::test]
async fn test_uninstalled_wired_unit_stays_until_refresh() {
    let framework = test_framework().await;
    let provider = framework
        .install("mem:a", &ManifestBuilder::unit("a").export("p", "1.0.0").build(), None)
        .await
        .unwrap();
    let client = framework
        .install("mem:b", &ManifestBuilder::unit("b").import("p", None).build(), None)
        .await
        .unwrap();
    framework.resolve(client).await.unwrap();

    framework.uninstall(provider).await.unwrap();

    assert_eq!(framework.state(provider).await.unwrap(), UnitState::Uninstalled);
    assert!(framework.current_revision(provider).await.is_none());
    assert_eq!(framework.revisions(provider).await.unwrap().len(), 1);
    assert_eq!(framework.removal_pending().await, vec![provider]);
    assert_eq!(framework.state(client).await.unwrap(), UnitState::Resolved);
}

#[tokio::test]
async fn test_uninstalled_unit_is_not_offered_to_new_importers() {
    let framework = test_framework().await;
    let provider = framework
        .install("mem:a", &ManifestBuilder::unit("a").export("p", "1.0.0").build(), None)
        .await
        .unwrap();
    let client = framework
        .install("mem:b", &ManifestBuilder::unit("b").import("p", None).build(), None)
        .await
        .unwrap();
    framework.resolve(client).await.unwrap();
    framework.uninstall(provider).await.unwrap();

    let late = framework
        .install("mem:c", &ManifestBuilder::unit("c").import("p", None).build(), None)
        .await
        .unwrap();
    let err = framework.resolve(late).await.unwrap_err();

    assert!(matches!(
        err,
        RuntimeError::Resolve(ResolveError::UnsatisfiedRequirement { .. })
    ));
    assert_eq!(framework.state(late).await.unwrap(), UnitState::Installed);
    assert!(
        framework
            .wiring(RevisionId::new(client, 0))
            .await
            .is_some()
    );
}

/// Installs and starts a child unit from its own start hook, and checks its
/// own state from its stop hook.
struct Spawner {
    seen: Arc<std::sync::Mutex<Vec<UnitState>>>,
}

#[async_trait]
impl Activator for Spawner {
    async fn start(&self, ctx: &UnitContext) -> anyhow::Result<()> {
        let framework = ctx.framework();
        let raw = ManifestBuilder::unit("child").build();
        let child = framework.install("mem:child", &raw, Some("child")).await?;
        framework.start(child).await?;
        Ok(())
    }

    async fn stop(&self, ctx: &UnitContext) -> anyhow::Result<()> {
        let state = ctx.framework().state(ctx.unit()).await?;
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(state);
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_hooks_may_reenter_the_framework() {
    let log = ActivationLog::new();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let framework = Framework::builder(test_section())
        .activator(
            "spawner",
            Spawner {
                seen: Arc::clone(&seen),
            },
        )
        .activator("child", RecordingActivator::new("child", &log))
        .build()
        .await
        .unwrap();
    let parent = framework
        .install("mem:parent", &ManifestBuilder::unit("parent").build(), Some("spawner"))
        .await
        .unwrap();

    framework.start(parent).await.unwrap();

    let child = framework.unit_at("mem:child").await.unwrap();
    assert_eq!(framework.state(child).await.unwrap(), UnitState::Active);
    assert_eq!(framework.state(parent).await.unwrap(), UnitState::Active);
    assert_eq!(log.entries(), vec!["start:child"]);

    framework.stop(parent).await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![UnitState::Stopping]);
}

#[tokio::test]
async fn test_shutdown_stops_newest_first() {
    let log = ActivationLog::new();
    let framework = Framework::builder(test_section())
        .activator("one", RecordingActivator::new("one", &log))
        .activator("two", RecordingActivator::new("two", &log))
        .build()
        .await
        .unwrap();
    let one = framework
        .install("mem:1", &ManifestBuilder::unit("one").build(), Some("one"))
        .await
        .unwrap();
    let two = framework
        .install("mem:2", &ManifestBuilder::unit("two").build(), Some("two"))
        .await
        .unwrap();
    framework.start(one).await.unwrap();
    framework.start(two).await.unwrap();
    log.clear();

    framework.shutdown().await;

    assert_eq!(log.entries(), vec!["stop:two", "stop:one"]);
    assert_eq!(framework.state(one).await.unwrap(), UnitState::Resolved);
    assert_eq!(framework.state(UnitId::SYSTEM).await.unwrap(), UnitState::Active);
}
