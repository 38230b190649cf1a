//! Resolver behaviour observed through the framework API.

use trellis_config::FrameworkSection;
use trellis_core::{Namespace, Requirement, RevisionId, UnitId};
use trellis_runtime::{
    Candidate, Framework, ResolveError, ResolverHook, Revision, RuntimeError, UnitState,
};
use trellis_test::{ManifestBuilder, init_test_logging, test_framework};

async fn install(framework: &Framework, location: &str, manifest: ManifestBuilder) -> UnitId {
    framework
        .install(location, &manifest.build(), None)
        .await
        .unwrap()
}

async fn current(framework: &Framework, unit: UnitId) -> RevisionId {
    framework.current_revision(unit).await.unwrap().id()
}

/// Providers wired to `unit` for `package`.
async fn providers_of(framework: &Framework, unit: UnitId, package: &str) -> Vec<RevisionId> {
    let wiring = framework
        .wiring(current(framework, unit).await)
        .await
        .unwrap();
    wiring
        .required_in(&Namespace::Package)
        .filter(|w| w.capability.key() == Some(package))
        .map(|w| w.provider)
        .collect()
}

#[tokio::test]
async fn test_unit_without_requirements_resolves() {
    init_test_logging();
    let framework = test_framework().await;
    let unit = install(&framework, "mem:empty", ManifestBuilder::unit("empty")).await;

    framework.resolve(unit).await.unwrap();

    assert_eq!(framework.state(unit).await.unwrap(), UnitState::Resolved);
    let wiring = framework.wiring(current(&framework, unit).await).await.unwrap();
    // Only the implicit bootstrap import.
    assert_eq!(wiring.required_wires().len(), 1);
    assert!(wiring.required_wires()[0].provider.unit.is_system());
}

#[tokio::test]
async fn test_existing_wiring_is_not_re_evaluated() {
    let framework = test_framework().await;
    let a = install(&framework, "mem:a", ManifestBuilder::unit("a").export("p", "1.0.0")).await;
    let b = install(
        &framework,
        "mem:b",
        ManifestBuilder::unit("b").import("p", Some("[1.0.0,2.0.0)")),
    )
    .await;

    let results = framework.resolve_units(&[a, b]).await;
    assert!(results.values().all(Result::is_ok));
    let a_rev = current(&framework, a).await;
    assert_eq!(providers_of(&framework, b, "p").await, vec![a_rev]);

    let c = install(&framework, "mem:c", ManifestBuilder::unit("c").export("p", "1.5.0")).await;
    framework.resolve(c).await.unwrap();

    assert_eq!(providers_of(&framework, b, "p").await, vec![a_rev]);
    assert_eq!(
        framework.dependents(a_rev).await.unwrap(),
        vec![current(&framework, b).await]
    );
}

#[tokio::test]
async fn test_provider_choice_is_deterministic() {
    let mut chosen = Vec::new();
    for _ in 0..2 {
        let framework = test_framework().await;
        install(&framework, "mem:a1", ManifestBuilder::unit("a1").export("p", "1.0.0")).await;
        install(&framework, "mem:a2", ManifestBuilder::unit("a2").export("p", "1.0.0")).await;
        let b = install(&framework, "mem:b", ManifestBuilder::unit("b").import("p", None)).await;
        framework.resolve(b).await.unwrap();
        chosen.push(providers_of(&framework, b, "p").await);
    }
    assert_eq!(chosen[0], chosen[1]);
    assert_eq!(chosen[0], vec![RevisionId::new(UnitId(1), 0)]);
}

#[tokio::test]
async fn test_highest_version_preferred() {
    let framework = test_framework().await;
    install(&framework, "mem:a1", ManifestBuilder::unit("a1").export("p", "1.0.0")).await;
    let a2 = install(&framework, "mem:a2", ManifestBuilder::unit("a2").export("p", "1.5.0")).await;
    let b = install(&framework, "mem:b", ManifestBuilder::unit("b").import("p", None)).await;

    framework.resolve(b).await.unwrap();

    assert_eq!(providers_of(&framework, b, "p").await, vec![current(&framework, a2).await]);
}

#[tokio::test]
async fn test_in_use_provider_beats_higher_version() {
    let framework = test_framework().await;
    let a1 = install(&framework, "mem:a1", ManifestBuilder::unit("a1").export("p", "1.0.0")).await;
    install(&framework, "mem:a2", ManifestBuilder::unit("a2").export("p", "2.0.0")).await;
    framework.resolve(a1).await.unwrap();

    let b = install(
        &framework,
        "mem:b",
        ManifestBuilder::unit("b").import("p", Some("[1.0.0,3.0.0)")),
    )
    .await;
    framework.resolve(b).await.unwrap();

    assert_eq!(providers_of(&framework, b, "p").await, vec![current(&framework, a1).await]);
}

#[tokio::test]
async fn test_version_range_excludes_provider() {
    let framework = test_framework().await;
    install(&framework, "mem:a", ManifestBuilder::unit("a").export("p", "2.0.0")).await;
    let b = install(
        &framework,
        "mem:b",
        ManifestBuilder::unit("b").import("p", Some("[1.0.0,2.0.0)")),
    )
    .await;

    let err = framework.resolve(b).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Resolve(ResolveError::UnsatisfiedRequirement { .. })
    ));
    assert_eq!(framework.state(b).await.unwrap(), UnitState::Installed);
}

#[tokio::test]
async fn test_failed_resolve_commits_nothing() {
    let framework = test_framework().await;
    let x = install(&framework, "mem:x", ManifestBuilder::unit("x").export("r", "1.0.0")).await;
    framework.resolve(x).await.unwrap();
    let x_rev = current(&framework, x).await;
    let provided_before = framework.wiring(x_rev).await.unwrap().provided_wires().len();

    let a = install(&framework, "mem:a", ManifestBuilder::unit("a").export("p", "1.0.0")).await;
    let b = install(
        &framework,
        "mem:b",
        ManifestBuilder::unit("b")
            .import("p", None)
            .import("q", None)
            .import("r", None),
    )
    .await;

    let err = framework.resolve(b).await.unwrap_err();
    match err {
        RuntimeError::Resolve(ResolveError::UnsatisfiedRequirement {
            revision,
            requirement,
            ..
        }) => {
            assert_eq!(revision.unit, b);
            assert!(requirement.contains("package=q"));
        },
        other => panic!("unexpected error: {other}"),
    }

    assert!(framework.wiring(current(&framework, b).await).await.is_none());
    assert!(framework.wiring(current(&framework, a).await).await.is_none());
    assert_eq!(framework.state(a).await.unwrap(), UnitState::Installed);
    assert_eq!(
        framework.wiring(x_rev).await.unwrap().provided_wires().len(),
        provided_before
    );
}

#[tokio::test]
async fn test_failing_provider_is_skipped_for_next_candidate() {
    let framework = test_framework().await;
    // Higher version but cannot resolve.
    install(
        &framework,
        "mem:broken",
        ManifestBuilder::unit("broken")
            .export("p", "2.0.0")
            .import("missing", None),
    )
    .await;
    let good = install(&framework, "mem:good", ManifestBuilder::unit("good").export("p", "1.0.0")).await;
    let b = install(&framework, "mem:b", ManifestBuilder::unit("b").import("p", None)).await;

    framework.resolve(b).await.unwrap();

    assert_eq!(providers_of(&framework, b, "p").await, vec![current(&framework, good).await]);
}

#[tokio::test]
async fn test_import_cycle_resolves() {
    let framework = test_framework().await;
    let a = install(
        &framework,
        "mem:a",
        ManifestBuilder::unit("a").export("pa", "1.0.0").import("pb", None),
    )
    .await;
    let b = install(
        &framework,
        "mem:b",
        ManifestBuilder::unit("b").export("pb", "1.0.0").import("pa", None),
    )
    .await;

    framework.resolve(a).await.unwrap();

    assert_eq!(framework.state(a).await.unwrap(), UnitState::Resolved);
    assert_eq!(framework.state(b).await.unwrap(), UnitState::Resolved);
    assert_eq!(providers_of(&framework, a, "pb").await, vec![current(&framework, b).await]);
    assert_eq!(providers_of(&framework, b, "pa").await, vec![current(&framework, a).await]);
}

#[tokio::test]
async fn test_import_of_own_export_needs_no_wire() {
    let framework = test_framework().await;
    let a = install(
        &framework,
        "mem:a",
        ManifestBuilder::unit("a").export("p", "1.0.0").import("p", None),
    )
    .await;

    framework.resolve(a).await.unwrap();

    assert!(providers_of(&framework, a, "p").await.is_empty());
}

#[tokio::test]
async fn test_fragment_capability_is_provided_by_host() {
    let framework = test_framework().await;
    let host = install(&framework, "mem:host", ManifestBuilder::unit("host")).await;
    let fragment = install(
        &framework,
        "mem:frag",
        ManifestBuilder::unit("frag")
            .fragment_of("host", None)
            .export("fp", "1.0.0"),
    )
    .await;
    let client = install(&framework, "mem:client", ManifestBuilder::unit("client").import("fp", None)).await;

    framework.resolve(client).await.unwrap();

    let host_rev = current(&framework, host).await;
    let fragment_rev = current(&framework, fragment).await;
    let wiring = framework.wiring(current(&framework, client).await).await.unwrap();
    let wire = wiring
        .required_in(&Namespace::Package)
        .find(|w| w.capability.key() == Some("fp"))
        .unwrap();
    assert_eq!(wire.provider, host_rev);
    assert_eq!(wire.declared_by, fragment_rev);

    let host_wiring = framework.wiring(host_rev).await.unwrap();
    assert_eq!(host_wiring.fragments(), &[fragment_rev]);
    assert_eq!(host_wiring.hosted_capabilities().len(), 1);
    assert_eq!(framework.state(fragment).await.unwrap(), UnitState::Resolved);
}

#[tokio::test]
async fn test_fragment_resolved_with_host_target() {
    let framework = test_framework().await;
    let host = install(&framework, "mem:host", ManifestBuilder::unit("host")).await;
    let fragment = install(
        &framework,
        "mem:frag",
        ManifestBuilder::unit("frag").fragment_of("host", Some("[1.0.0,2.0.0)")),
    )
    .await;

    let results = framework.resolve_units(&[host, fragment]).await;
    assert!(results.values().all(Result::is_ok));

    let host_rev = current(&framework, host).await;
    let fragment_rev = current(&framework, fragment).await;
    assert_eq!(framework.wiring(host_rev).await.unwrap().fragments(), &[fragment_rev]);
    let fragment_wiring = framework.wiring(fragment_rev).await.unwrap();
    let host_wire = fragment_wiring.required_in(&Namespace::Host).next().unwrap();
    assert_eq!(host_wire.provider, host_rev);
}

#[tokio::test]
async fn test_fragment_without_host_fails() {
    let framework = test_framework().await;
    let fragment = install(
        &framework,
        "mem:frag",
        ManifestBuilder::unit("frag").fragment_of("nowhere", None),
    )
    .await;

    let err = framework.resolve(fragment).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Resolve(ResolveError::NoHost { .. })));
}

#[tokio::test]
async fn test_fragment_joins_wired_host_when_it_adds_no_imports() {
    let framework = test_framework().await;
    let host = install(&framework, "mem:host", ManifestBuilder::unit("host")).await;
    framework.resolve(host).await.unwrap();
    let host_rev = current(&framework, host).await;

    let fragment = install(
        &framework,
        "mem:frag",
        ManifestBuilder::unit("frag")
            .fragment_of("host", None)
            .export("fp", "1.0.0"),
    )
    .await;
    framework.resolve(fragment).await.unwrap();

    let fragment_rev = current(&framework, fragment).await;
    assert_eq!(framework.state(fragment).await.unwrap(), UnitState::Resolved);
    let host_wiring = framework.wiring(host_rev).await.unwrap();
    assert_eq!(host_wiring.fragments(), &[fragment_rev]);
    assert_eq!(host_wiring.hosted_capabilities().len(), 1);
    assert_eq!(framework.dependents(host_rev).await.unwrap(), vec![fragment_rev]);

    let client = install(&framework, "mem:client", ManifestBuilder::unit("client").import("fp", None)).await;
    framework.resolve(client).await.unwrap();
    assert_eq!(providers_of(&framework, client, "fp").await, vec![host_rev]);
}

#[tokio::test]
async fn test_fragment_with_imports_cannot_join_wired_host() {
    let framework = test_framework().await;
    install(&framework, "mem:prov", ManifestBuilder::unit("prov").export("fq", "1.0.0")).await;
    let host = install(&framework, "mem:host", ManifestBuilder::unit("host")).await;
    framework.resolve(host).await.unwrap();
    let fragment = install(
        &framework,
        "mem:frag",
        ManifestBuilder::unit("frag")
            .fragment_of("host", None)
            .import("fq", None),
    )
    .await;

    let err = framework.resolve(fragment).await.unwrap_err();

    assert!(matches!(err, RuntimeError::Resolve(ResolveError::NoHost { .. })));
    assert_eq!(framework.state(fragment).await.unwrap(), UnitState::Installed);
    let host_wiring = framework.wiring(current(&framework, host).await).await.unwrap();
    assert!(host_wiring.fragments().is_empty());
}

#[tokio::test]
async fn test_fragment_imports_are_merged_into_host() {
    let framework = test_framework().await;
    let provider = install(&framework, "mem:prov", ManifestBuilder::unit("prov").export("fq", "1.0.0")).await;
    let host = install(&framework, "mem:host", ManifestBuilder::unit("host")).await;
    install(
        &framework,
        "mem:frag",
        ManifestBuilder::unit("frag")
            .fragment_of("host", None)
            .import("fq", None),
    )
    .await;

    framework.resolve(host).await.unwrap();

    assert_eq!(
        providers_of(&framework, host, "fq").await,
        vec![current(&framework, provider).await]
    );
}

#[tokio::test]
async fn test_singletons_resolved_together_admit_one() {
    let framework = test_framework().await;
    let first = install(&framework, "mem:s1", ManifestBuilder::unit("solo").singleton()).await;
    let second = install(
        &framework,
        "mem:s2",
        ManifestBuilder::unit("solo").version("2.0.0").singleton(),
    )
    .await;

    let results = framework.resolve_units(&[first, second]).await;

    assert!(results[&first].is_ok());
    assert!(matches!(
        &results[&second],
        Err(RuntimeError::Resolve(ResolveError::SingletonCollision { symbolic_name, .. }))
            if symbolic_name == "solo"
    ));
    assert_eq!(framework.state(first).await.unwrap(), UnitState::Resolved);
    assert_eq!(framework.state(second).await.unwrap(), UnitState::Installed);
}

#[tokio::test]
async fn test_non_singletons_share_a_name() {
    let framework = test_framework().await;
    let first = install(&framework, "mem:n1", ManifestBuilder::unit("dup")).await;
    let second = install(&framework, "mem:n2", ManifestBuilder::unit("dup").version("2.0.0")).await;

    let results = framework.resolve_units(&[first, second]).await;
    assert!(results.values().all(Result::is_ok));
}

#[tokio::test]
async fn test_updated_singleton_does_not_collide_with_itself() {
    let framework = test_framework().await;
    let solo = install(
        &framework,
        "mem:solo",
        ManifestBuilder::unit("solo").singleton().export("p", "1.0.0"),
    )
    .await;
    let client = install(&framework, "mem:b", ManifestBuilder::unit("b").import("p", None)).await;
    framework.resolve(client).await.unwrap();
    let old = current(&framework, solo).await;

    let raw = ManifestBuilder::unit("solo")
        .version("2.0.0")
        .singleton()
        .export("p", "2.0.0")
        .build();
    let new = framework.update(solo, &raw).await.unwrap();
    framework.resolve(solo).await.unwrap();

    assert!(framework.wiring(new).await.is_some());
    assert!(framework.wiring(old).await.unwrap().is_in_use());
}

#[tokio::test]
async fn test_uninstalled_singleton_does_not_block_successor() {
    let framework = test_framework().await;
    let first = install(
        &framework,
        "mem:s1",
        ManifestBuilder::unit("solo").singleton().export("p", "1.0.0"),
    )
    .await;
    let client = install(&framework, "mem:b", ManifestBuilder::unit("b").import("p", None)).await;
    framework.resolve(client).await.unwrap();
    framework.uninstall(first).await.unwrap();

    let second = install(
        &framework,
        "mem:s2",
        ManifestBuilder::unit("solo").version("2.0.0").singleton(),
    )
    .await;

    framework.resolve(second).await.unwrap();
    assert_eq!(framework.state(second).await.unwrap(), UnitState::Resolved);
}

#[tokio::test]
async fn test_optional_import_without_provider() {
    let framework = test_framework().await;
    let unit = install(
        &framework,
        "mem:opt",
        ManifestBuilder::unit("opt").optional_import("absent", None),
    )
    .await;

    framework.resolve(unit).await.unwrap();

    assert!(providers_of(&framework, unit, "absent").await.is_empty());
}

#[tokio::test]
async fn test_dynamic_import_is_recorded_not_wired() {
    let framework = test_framework().await;
    install(&framework, "mem:a", ManifestBuilder::unit("a").export("com.acme.x", "1.0.0")).await;
    let unit = install(
        &framework,
        "mem:dyn",
        ManifestBuilder::unit("dyn").dynamic_import("com.acme.*"),
    )
    .await;

    framework.resolve(unit).await.unwrap();

    let wiring = framework.wiring(current(&framework, unit).await).await.unwrap();
    assert_eq!(wiring.dynamic_requirements().len(), 1);
    assert!(providers_of(&framework, unit, "com.acme.x").await.is_empty());
}

#[tokio::test]
async fn test_multiple_cardinality_wires_every_provider() {
    let framework = test_framework().await;
    let a = install(
        &framework,
        "mem:a",
        ManifestBuilder::unit("a").section(
            "[[capability]]\nnamespace = \"acme.plugin\"\n[capability.attributes]\n\"acme.plugin\" = \"x\"\n",
        ),
    )
    .await;
    let b = install(
        &framework,
        "mem:b",
        ManifestBuilder::unit("b").section(
            "[[capability]]\nnamespace = \"acme.plugin\"\n[capability.attributes]\n\"acme.plugin\" = \"y\"\n",
        ),
    )
    .await;
    let consumer = install(
        &framework,
        "mem:consumer",
        ManifestBuilder::unit("consumer").section(
            "[[requirement]]\nnamespace = \"acme.plugin\"\nfilter = \"(acme.plugin=*)\"\n[requirement.directives]\ncardinality = \"multiple\"\n",
        ),
    )
    .await;

    framework.resolve(consumer).await.unwrap();

    let wiring = framework.wiring(current(&framework, consumer).await).await.unwrap();
    let namespace = Namespace::from("acme.plugin");
    let mut providers: Vec<UnitId> = wiring.required_in(&namespace).map(|w| w.provider.unit).collect();
    providers.sort();
    assert_eq!(providers, vec![a, b]);
}

#[tokio::test]
async fn test_mandatory_attribute_must_be_named() {
    let framework = test_framework().await;
    install(
        &framework,
        "mem:a",
        ManifestBuilder::unit("a").export_mandatory("p", "1.0.0", &[("vendor", "acme")]),
    )
    .await;
    let plain = install(&framework, "mem:plain", ManifestBuilder::unit("plain").import("p", None)).await;
    let named = install(
        &framework,
        "mem:named",
        ManifestBuilder::unit("named").import_with("p", None, None, &[("vendor", "acme")]),
    )
    .await;

    assert!(framework.resolve(plain).await.is_err());
    framework.resolve(named).await.unwrap();
}

#[tokio::test]
async fn test_require_unit_wires_bundle_capability() {
    let framework = test_framework().await;
    let lib = install(&framework, "mem:lib", ManifestBuilder::unit("lib").version("1.2.0")).await;
    let app = install(
        &framework,
        "mem:app",
        ManifestBuilder::unit("app").require_unit("lib", Some("[1.0.0,2.0.0)")),
    )
    .await;

    framework.resolve(app).await.unwrap();

    let wiring = framework.wiring(current(&framework, app).await).await.unwrap();
    let wire = wiring.required_in(&Namespace::Bundle).next().unwrap();
    assert_eq!(wire.provider, current(&framework, lib).await);
}

#[tokio::test]
async fn test_reexported_units_are_visible_to_requirers() {
    let framework = test_framework().await;
    let core = install(&framework, "mem:core", ManifestBuilder::unit("core")).await;
    let util = install(&framework, "mem:util", ManifestBuilder::unit("util")).await;
    let api = install(
        &framework,
        "mem:api",
        ManifestBuilder::unit("api")
            .reexport_unit("core")
            .require_unit("util", None),
    )
    .await;
    let app = install(&framework, "mem:app", ManifestBuilder::unit("app").require_unit("api", None)).await;

    framework.resolve(app).await.unwrap();

    let core_rev = current(&framework, core).await;
    let api_rev = current(&framework, api).await;
    assert_eq!(
        framework.visible_bundles(api_rev).await.unwrap(),
        vec![core_rev, current(&framework, util).await]
    );
    assert_eq!(
        framework
            .visible_bundles(current(&framework, app).await)
            .await
            .unwrap(),
        vec![api_rev, core_rev]
    );
}

#[tokio::test]
async fn test_execution_environment_requirements() {
    let framework = test_framework().await;
    let modern = install(&framework, "mem:ee1", ManifestBuilder::unit("ee1").required_ee("JavaSE-1.8")).await;
    let aliased = install(&framework, "mem:ee2", ManifestBuilder::unit("ee2").required_ee("J2SE-1.5")).await;
    let future = install(&framework, "mem:ee3", ManifestBuilder::unit("ee3").required_ee("JavaSE-11")).await;
    let either = install(
        &framework,
        "mem:ee4",
        ManifestBuilder::unit("ee4")
            .required_ee("JavaSE-11")
            .required_ee("OSGi/Minimum-1.2"),
    )
    .await;

    let results = framework.resolve_units(&[modern, aliased, future, either]).await;

    assert!(results[&modern].is_ok());
    assert!(results[&aliased].is_ok());
    assert!(results[&future].is_err());
    assert!(results[&either].is_ok());
}

#[tokio::test]
async fn test_malformed_ee_token_rejected_at_install() {
    let framework = test_framework().await;
    let raw = ManifestBuilder::unit("bad").required_ee("a/b/c").build();
    let err = framework.install("mem:bad", &raw, None).await.unwrap_err();
    assert!(matches!(err, RuntimeError::ManifestTranslation { .. }));
    assert!(framework.unit_at("mem:bad").await.is_none());
}

#[tokio::test]
async fn test_bootstrap_import_can_be_disabled() {
    let section = FrameworkSection {
        implicit_bootstrap_import: false,
        ..FrameworkSection::default()
    };
    let framework = Framework::open(section).await.unwrap();
    let unit = install(&framework, "mem:u", ManifestBuilder::unit("u")).await;

    framework.resolve(unit).await.unwrap();

    let wiring = framework.wiring(current(&framework, unit).await).await.unwrap();
    assert!(wiring.required_wires().is_empty());
}

#[tokio::test]
async fn test_system_packages_are_importable() {
    let mut section = FrameworkSection::default();
    section.system_packages.push(trellis_config::SystemPackage {
        name: "host.api".into(),
        version: Some("3.1".into()),
    });
    let framework = Framework::open(section).await.unwrap();
    let unit = install(
        &framework,
        "mem:u",
        ManifestBuilder::unit("u").import("host.api", Some("[3.0,4.0)")),
    )
    .await;

    framework.resolve(unit).await.unwrap();

    let providers = providers_of(&framework, unit, "host.api").await;
    assert_eq!(providers, vec![RevisionId::new(UnitId::SYSTEM, 0)]);
}

struct DenyUnit(&'static str);

impl ResolverHook for DenyUnit {
    fn allow_resolve(&self, revision: &Revision) -> bool {
        revision.symbolic_name() != self.0
    }
}

struct HideProvider(&'static str);

impl ResolverHook for HideProvider {
    fn filter_candidates(
        &self,
        _requirer: &Revision,
        _requirement: &Requirement,
        candidates: &mut Vec<Candidate>,
    ) {
        candidates.retain(|c| {
            c.capability
                .attribute("bundle-symbolic-name")
                .is_none_or(|v| v.to_string() != self.0)
        });
    }
}

#[tokio::test]
async fn test_hook_veto_rolls_back_dependents() {
    let framework = Framework::builder(FrameworkSection::default())
        .resolver_hook(DenyUnit("vetoed"))
        .build()
        .await
        .unwrap();
    let vetoed = install(&framework, "mem:v", ManifestBuilder::unit("vetoed").export("p", "1.0.0")).await;
    let client = install(&framework, "mem:c", ManifestBuilder::unit("client").import("p", None)).await;

    let err = framework.resolve(client).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Resolve(ResolveError::UnsatisfiedRequirement { .. })));
    assert!(matches!(
        framework.resolve(vetoed).await.unwrap_err(),
        RuntimeError::Resolve(ResolveError::Vetoed { .. })
    ));
}

#[tokio::test]
async fn test_hook_filters_candidates() {
    let framework = Framework::builder(FrameworkSection::default())
        .resolver_hook(HideProvider("hidden"))
        .build()
        .await
        .unwrap();
    install(&framework, "mem:h", ManifestBuilder::unit("hidden").export("p", "2.0.0")).await;
    let visible = install(&framework, "mem:v", ManifestBuilder::unit("visible").export("p", "1.0.0")).await;
    let client = install(&framework, "mem:c", ManifestBuilder::unit("client").import("p", None)).await;

    framework.resolve(client).await.unwrap();

    assert_eq!(
        providers_of(&framework, client, "p").await,
        vec![current(&framework, visible).await]
    );
}
