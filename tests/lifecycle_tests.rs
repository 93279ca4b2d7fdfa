//! Integration tests for the lifecycle engine: hook ordering, concurrent
//! loads, failure parking, and unload/update flows.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map};

use microweave::app::registry::{hook, AppRegistry, LifecycleHooks};
use microweave::app::state_bus::GlobalStateBus;
use microweave::domain::app::AppStatus;
use microweave::testkit::domain::descriptor;
use microweave::testkit::host::{CollectingTelemetry, RecordingContainerHost};
use microweave::testkit::loader::{Journal, ScriptedLoader};

struct Harness {
    registry: Arc<AppRegistry>,
    loader: Arc<ScriptedLoader>,
    containers: Arc<RecordingContainerHost>,
    telemetry: Arc<CollectingTelemetry>,
    journal: Journal,
}

fn harness(loader: ScriptedLoader, journal: Journal) -> Harness {
    let loader = Arc::new(loader);
    let containers = Arc::new(RecordingContainerHost::new());
    let telemetry = Arc::new(CollectingTelemetry::new());
    let registry = Arc::new(AppRegistry::new(
        loader.clone(),
        containers.clone(),
        Arc::new(GlobalStateBus::new(Map::new())),
        telemetry.clone(),
    ));
    Harness {
        registry,
        loader,
        containers,
        telemetry,
        journal,
    }
}

fn simple_harness() -> Harness {
    let journal = Journal::new();
    harness(ScriptedLoader::new(journal.clone()), journal)
}

#[tokio::test]
async fn load_runs_the_full_lifecycle() {
    let h = simple_harness();
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());

    let instance = h.registry.load_app("orders", None, None).await.unwrap();

    assert_eq!(instance.status(), AppStatus::Mounted);
    assert_eq!(
        h.journal.entries(),
        vec!["orders:load", "orders:bootstrap", "orders:mount"]
    );
    assert!(h.containers.is_visible("#orders"));
}

#[tokio::test]
async fn hooks_run_in_order_around_the_lifecycle() {
    let journal = Journal::new();
    let h = harness(ScriptedLoader::new(journal.clone()), journal.clone());

    let record = |label: &'static str| {
        let journal = journal.clone();
        hook(move |_descriptor| {
            let journal = journal.clone();
            async move {
                journal.push(label);
                Ok::<(), std::convert::Infallible>(())
            }
        })
    };
    let hooks = LifecycleHooks {
        before_load: Some(record("hook:before_load")),
        before_mount: Some(record("hook:before_mount")),
        after_mount: Some(record("hook:after_mount")),
        before_unmount: Some(record("hook:before_unmount")),
        after_unmount: Some(record("hook:after_unmount")),
    };
    h.registry.register_apps(vec![descriptor("orders")], hooks);

    h.registry.load_app("orders", None, None).await.unwrap();
    h.registry.unload_app("orders").await.unwrap();

    assert_eq!(
        h.journal.entries(),
        vec![
            "hook:before_load",
            "orders:load",
            "orders:bootstrap",
            "hook:before_mount",
            "orders:mount",
            "hook:after_mount",
            "hook:before_unmount",
            "orders:unmount",
            "hook:after_unmount",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_loads_share_one_instance() {
    let journal = Journal::new();
    let loader =
        ScriptedLoader::new(journal.clone()).load_delay("orders", Duration::from_millis(50));
    let h = harness(loader, journal);
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());

    let (a, b) = tokio::join!(
        h.registry.load_app("orders", None, None),
        h.registry.load_app("orders", None, None),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(h.loader.load_count("orders"), 1);
    assert_eq!(h.journal.count("orders:mount"), 1);
}

#[tokio::test]
async fn loading_an_unregistered_app_fails() {
    let h = simple_harness();
    assert!(h.registry.load_app("ghost", None, None).await.is_err());
}

#[tokio::test]
async fn rejected_before_load_hook_parks_in_load_error() {
    let journal = Journal::new();
    let h = harness(ScriptedLoader::new(journal.clone()), journal);
    let hooks = LifecycleHooks {
        before_load: Some(hook(|_descriptor| async {
            Err::<(), _>(std::io::Error::other("quota exceeded"))
        })),
        ..LifecycleHooks::default()
    };
    h.registry.register_apps(vec![descriptor("orders")], hooks);

    let err = h.registry.load_app("orders", None, None).await.unwrap_err();
    assert!(err.to_string().contains("quota exceeded"));

    let instance = h.registry.get_instance("orders").unwrap();
    assert_eq!(instance.status(), AppStatus::LoadError);
    assert!(h.journal.entries().is_empty());
    assert!(!h.containers.is_visible("#orders"));
    assert!(!h.telemetry.errors().is_empty());
}

#[tokio::test]
async fn failed_source_fetch_parks_in_load_error() {
    let journal = Journal::new();
    let loader = ScriptedLoader::new(journal.clone()).fail_load("orders", "404 from cdn");
    let h = harness(loader, journal);
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());

    assert!(h.registry.load_app("orders", None, None).await.is_err());
    let instance = h.registry.get_instance("orders").unwrap();
    assert_eq!(instance.status(), AppStatus::LoadError);
}

#[tokio::test]
async fn rejected_bootstrap_parks_in_skip_because_broken() {
    let journal = Journal::new();
    let loader = ScriptedLoader::new(journal.clone()).fail_bootstrap("orders", "init threw");
    let h = harness(loader, journal);
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());

    assert!(h.registry.load_app("orders", None, None).await.is_err());
    let instance = h.registry.get_instance("orders").unwrap();
    assert_eq!(instance.status(), AppStatus::SkipBecauseBroken);
}

#[tokio::test]
async fn rejected_mount_parks_and_hides_the_container() {
    let journal = Journal::new();
    let loader = ScriptedLoader::new(journal.clone()).fail_mount("orders", "render threw");
    let h = harness(loader, journal);
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());

    assert!(h.registry.load_app("orders", None, None).await.is_err());
    let instance = h.registry.get_instance("orders").unwrap();
    assert_eq!(instance.status(), AppStatus::SkipBecauseBroken);
    assert!(!h.containers.is_visible("#orders"));
}

#[tokio::test]
async fn a_parked_app_does_not_affect_its_siblings() {
    let journal = Journal::new();
    let loader = ScriptedLoader::new(journal.clone()).fail_bootstrap("orders", "init threw");
    let h = harness(loader, journal);
    h.registry.register_apps(
        vec![descriptor("orders"), descriptor("billing")],
        LifecycleHooks::default(),
    );

    assert!(h.registry.load_app("orders", None, None).await.is_err());
    let billing = h.registry.load_app("billing", None, None).await.unwrap();
    assert_eq!(billing.status(), AppStatus::Mounted);
}

#[tokio::test]
async fn unload_removes_the_instance_and_allows_a_fresh_load() {
    let h = simple_harness();
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());

    h.registry.load_app("orders", None, None).await.unwrap();
    h.registry.unload_app("orders").await.unwrap();

    assert!(h.registry.get_instance("orders").is_none());
    assert!(!h.containers.is_visible("#orders"));

    h.registry.load_app("orders", None, None).await.unwrap();
    assert_eq!(h.loader.load_count("orders"), 2);
}

#[tokio::test]
async fn unload_of_an_absent_instance_is_a_noop() {
    let h = simple_harness();
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());
    h.registry.unload_app("orders").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unload_waits_for_an_inflight_load() {
    let journal = Journal::new();
    let loader =
        ScriptedLoader::new(journal.clone()).mount_delay("orders", Duration::from_millis(100));
    let h = harness(loader, journal);
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());

    let registry = h.registry.clone();
    let load = tokio::spawn(async move { registry.load_app("orders", None, None).await });
    tokio::time::sleep(Duration::from_millis(1)).await;

    h.registry.unload_app("orders").await.unwrap();

    load.await.unwrap().unwrap();
    assert_eq!(
        h.journal.entries(),
        vec!["orders:load", "orders:bootstrap", "orders:mount", "orders:unmount"]
    );
    assert!(h.registry.get_instance("orders").is_none());
}

#[tokio::test]
async fn rejected_before_unmount_hook_keeps_the_app_mounted() {
    let journal = Journal::new();
    let h = harness(ScriptedLoader::new(journal.clone()), journal);
    let hooks = LifecycleHooks {
        before_unmount: Some(hook(|_descriptor| async {
            Err::<(), _>(std::io::Error::other("unsaved changes"))
        })),
        ..LifecycleHooks::default()
    };
    h.registry.register_apps(vec![descriptor("orders")], hooks);

    h.registry.load_app("orders", None, None).await.unwrap();
    assert!(h.registry.unload_app("orders").await.is_err());

    let instance = h.registry.get_instance("orders").unwrap();
    assert_eq!(instance.status(), AppStatus::Mounted);
    assert!(h.containers.is_visible("#orders"));
}

#[tokio::test]
async fn rejected_unmount_still_evicts_and_reports() {
    let journal = Journal::new();
    let loader = ScriptedLoader::new(journal.clone()).fail_unmount("orders", "teardown threw");
    let h = harness(loader, journal);
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());

    h.registry.load_app("orders", None, None).await.unwrap();
    assert!(h.registry.unload_app("orders").await.is_err());

    assert!(h.registry.get_instance("orders").is_none());
    assert!(!h.containers.is_visible("#orders"));
    assert!(!h.telemetry.errors().is_empty());
}

#[tokio::test]
async fn update_cycles_through_updating_and_back() {
    let h = simple_harness();
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());
    h.registry.load_app("orders", None, None).await.unwrap();

    let mut props = Map::new();
    props.insert("tab".to_string(), json!("open"));
    h.registry.update_app("orders", props).await.unwrap();

    let instance = h.registry.get_instance("orders").unwrap();
    assert_eq!(instance.status(), AppStatus::Mounted);
    assert!(h.journal.contains("orders:update"));
}

#[tokio::test]
async fn update_of_an_unloaded_app_fails() {
    let h = simple_harness();
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());
    assert!(h.registry.update_app("orders", Map::new()).await.is_err());
}

#[tokio::test]
async fn reregistering_replaces_the_descriptor_without_touching_the_instance() {
    let h = simple_harness();
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());
    let instance = h.registry.load_app("orders", None, None).await.unwrap();

    let mut replacement = descriptor("orders");
    replacement.active_rule = "/sales/orders".to_string();
    h.registry
        .register_apps(vec![replacement], LifecycleHooks::default());

    assert_eq!(instance.status(), AppStatus::Mounted);
    assert_eq!(
        h.registry.descriptor("orders").unwrap().active_rule,
        "/sales/orders"
    );
}

#[tokio::test]
async fn late_mounting_app_sees_earlier_global_state() {
    let h = simple_harness();
    h.registry
        .register_apps(vec![descriptor("orders")], LifecycleHooks::default());

    let mut partial = Map::new();
    partial.insert("user".to_string(), json!("ada"));
    h.registry.set_global_state(partial);

    h.registry.load_app("orders", None, None).await.unwrap();

    let seen = h.loader.mounted_state("orders").unwrap();
    assert_eq!(seen.get("user"), Some(&json!("ada")));
    assert_eq!(seen.version(), 1);
}

#[tokio::test]
async fn app_for_path_picks_the_longest_matching_prefix() {
    let h = simple_harness();
    let mut orders = descriptor("orders");
    orders.active_rule = "/sales".to_string();
    let mut invoices = descriptor("invoices");
    invoices.active_rule = "/sales/invoices".to_string();
    h.registry
        .register_apps(vec![orders, invoices], LifecycleHooks::default());

    assert_eq!(
        h.registry.app_for_path("/sales/invoices/42").unwrap().name,
        "invoices"
    );
    assert_eq!(h.registry.app_for_path("/sales/orders").unwrap().name, "orders");
    assert!(h.registry.app_for_path("/settings").is_none());
}
