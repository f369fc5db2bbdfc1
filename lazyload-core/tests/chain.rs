//! End-to-end chain behavior against a scripted transport.

mod support;

use std::time::Duration;

use lazyload_core::{
    ConfigPatch, DescriptorOverrides, LoadError, LoaderConfig, PlacementTarget,
};
use lazyload_config::DebugConfig;
use support::{
    Outcomes, ScriptedTransport, init_test_logging, loader, loader_with, names,
};

#[tokio::test]
async fn single_resource_succeeds_once() {
    let transport = ScriptedTransport::new();
    transport.serve("a.js", "run();");
    let (loader, sink) = loader(&transport);
    let mut outcomes = Outcomes::new();

    loader
        .require("a.js")
        .then(outcomes.on_success(), outcomes.on_failure());

    assert_eq!(outcomes.next().await.unwrap(), names(&["a.js"]));
    loader.snapshot().await.unwrap();
    outcomes.assert_drained();

    let placed = sink.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].payload_str(), Some("run();"));
    assert_eq!(placed[0].target, PlacementTarget::Head);
}

#[tokio::test]
async fn declared_dependency_is_placed_first() {
    let transport = ScriptedTransport::new();
    transport
        .serve("a.js", "/* @resources b.js */\nstart();")
        .serve("b.js", "lib();");
    let (loader, sink) = loader(&transport);

    let loaded = loader.require("a.js").wait().await.unwrap();

    assert_eq!(loaded, names(&["a.js", "b.js"]));
    assert_eq!(sink.names(), names(&["b.js", "a.js"]));
    assert_eq!(
        sink.placed()[0].parent.as_ref().map(|k| k.as_str()),
        Some("a.js")
    );
}

#[tokio::test]
async fn dependency_count_matches_declarations() {
    let transport = ScriptedTransport::new();
    transport
        .serve("app.js", "// @resources one.js, two.js\n// @files three.js")
        .serve("one.js", "")
        .serve("two.js", "")
        .serve("three.js", "");
    let (loader, sink) = loader(&transport);

    let loaded = loader.require("app.js").wait().await.unwrap();

    assert_eq!(loaded.len(), 4);
    let placed = sink.names();
    assert_eq!(placed.last().map(String::as_str), Some("app.js"));
}

#[tokio::test]
async fn siblings_report_request_order() {
    let transport = ScriptedTransport::new();
    transport
        .serve_after("x.js", "", Duration::from_millis(60))
        .serve("y.js", "");
    let (loader, sink) = loader(&transport);

    let loaded = loader.require("x.js,y.js").wait().await.unwrap();

    assert_eq!(loaded, names(&["x.js", "y.js"]));
    assert_eq!(sink.placed().len(), 2);
}

#[tokio::test]
async fn same_name_twice_fetches_and_places_once() {
    let transport = ScriptedTransport::new();
    transport.serve("a.js", "");
    let (loader, sink) = loader(&transport);

    let loaded = loader.require("a.js").and("a.js").wait().await.unwrap();

    assert_eq!(loaded, names(&["a.js"]));
    assert_eq!(transport.fetches("a.js"), 1);
    assert_eq!(sink.names(), names(&["a.js"]));
}

#[tokio::test]
async fn explicit_and_discovered_dependency_fetched_once() {
    let transport = ScriptedTransport::new();
    transport
        .serve("a.js", "// @resources c.js")
        .serve("c.js", "");
    let (loader, sink) = loader(&transport);

    let loaded = loader.require("a.js").and("c.js").wait().await.unwrap();

    assert_eq!(loaded, names(&["a.js", "c.js"]));
    assert_eq!(transport.fetches("c.js"), 1);
    assert_eq!(sink.names(), names(&["c.js", "a.js"]));
}

#[tokio::test]
async fn failed_resource_aborts_the_chain() {
    let transport = ScriptedTransport::new();
    transport.serve("a.js", "").fail("bad.js", 500);
    let (loader, sink) = loader(&transport);
    let mut outcomes = Outcomes::new();

    loader
        .require("a.js,bad.js")
        .then(outcomes.on_success(), outcomes.on_failure());

    let failure = outcomes.next().await.unwrap_err();
    assert_eq!(failure.name, "bad.js");
    assert!(failure.error.is_fetch_failure());

    let stats = loader.snapshot().await.unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.chains_failed, 1);
    outcomes.assert_drained();
    assert!(sink.placed().is_empty());
}

#[tokio::test]
async fn unknown_resource_fails_with_its_name() {
    let transport = ScriptedTransport::new();
    transport.serve("a.js", "// @resources missing.js");
    let (loader, _sink) = loader(&transport);

    let failure = loader.require("a.js").wait().await.unwrap_err();

    assert_eq!(failure.name, "missing.js");
}

#[tokio::test]
async fn pending_counter_returns_to_zero() {
    let transport = ScriptedTransport::new();
    transport
        .serve("a.js", "// @resources b.js")
        .serve("b.js", "");
    let (loader, _sink) = loader(&transport);

    loader.require("a.js").wait().await.unwrap();
    let stats = loader.snapshot().await.unwrap();

    assert_eq!(stats.pending, 0);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.tree_len, 0);
    assert_eq!(stats.open_pipes, 0);
    assert!(!stats.active);
    assert_eq!(stats.chains_completed, 1);
}

#[tokio::test]
async fn empty_configure_returns_current_config() {
    let transport = ScriptedTransport::new();
    let config = LoaderConfig {
        extension: Some(".js".into()),
        pipes_max: 4,
        ..LoaderConfig::default()
    };
    let (loader, _sink) = loader_with(&transport, config.clone());

    assert_eq!(loader.configure(&ConfigPatch::default()), config);
    assert_eq!(loader.config(), config);
}

#[tokio::test]
async fn configure_merges_override_wins() {
    let transport = ScriptedTransport::new();
    let (loader, _sink) = loader(&transport);

    let updated = loader.configure(&ConfigPatch {
        timeout_ms: Some(250),
        parse: Some(false),
        ..ConfigPatch::default()
    });

    assert_eq!(updated.timeout_ms, 250);
    assert!(!updated.parse);
    assert!(updated.caching);
    assert_eq!(loader.config(), updated);
}

#[tokio::test]
async fn pipe_ceiling_bounds_concurrent_fetches() {
    let transport = ScriptedTransport::new();
    let requested: Vec<String> = (0..6).map(|i| format!("r{i}.js")).collect();
    for name in &requested {
        transport.serve_after(name, "", Duration::from_millis(30));
    }
    let config = LoaderConfig {
        pipes_max: 2,
        ..LoaderConfig::default()
    };
    let (loader, _sink) = loader_with(&transport, config);

    let loaded = loader.require(&requested.join(",")).wait().await.unwrap();

    assert_eq!(loaded, requested);
    assert!(transport.peak_concurrency() <= 2);
    assert_eq!(transport.total_fetches(), 6);
}

#[tokio::test]
async fn slow_fetch_times_out() {
    let transport = ScriptedTransport::new();
    transport.serve_after("slow.js", "", Duration::from_millis(500));
    let config = LoaderConfig {
        timeout_ms: 20,
        ..LoaderConfig::default()
    };
    let (loader, _sink) = loader_with(&transport, config);

    let failure = loader.require("slow.js").wait().await.unwrap_err();

    assert_eq!(failure.name, "slow.js");
    assert!(matches!(failure.error, LoadError::Timeout { .. }));
    assert_eq!(loader.snapshot().await.unwrap().open_pipes, 0);
}

#[tokio::test]
async fn session_cache_serves_repeat_chains() {
    let transport = ScriptedTransport::new();
    transport.serve("a.js", "");
    let (loader, sink) = loader(&transport);

    loader.require("a.js").wait().await.unwrap();
    loader.require("a.js").wait().await.unwrap();

    assert_eq!(transport.fetches("a.js"), 1);
    assert_eq!(sink.names(), names(&["a.js", "a.js"]));
}

#[tokio::test]
async fn non_cacheable_resource_bypasses_caches() {
    let transport = ScriptedTransport::new();
    transport.serve("live.js", "");
    let (loader, _sink) = loader(&transport);
    let properties = DescriptorOverrides {
        cacheable: Some(false),
        ..DescriptorOverrides::default()
    };

    for _ in 0..2 {
        loader
            .require_with("live.js", properties.clone(), ConfigPatch::default())
            .wait()
            .await
            .unwrap();
    }

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.bypass_cache));
}

#[tokio::test]
async fn declared_configuration_applies_globally() {
    let transport = ScriptedTransport::new();
    transport.serve("boot.js", "// @configuration timeout:1500, pipesMax:3");
    let (loader, _sink) = loader(&transport);

    loader.require("boot.js").wait().await.unwrap();

    let config = loader.config();
    assert_eq!(config.timeout_ms, 1500);
    assert_eq!(config.pipes_max, 3);
}

#[tokio::test]
async fn declared_properties_reach_dependencies() {
    let transport = ScriptedTransport::new();
    transport
        .serve("page.js", "// @resources late.js\n// @properties target:body")
        .serve("late.js", "");
    let (loader, sink) = loader(&transport);

    loader.require("page.js").wait().await.unwrap();

    let placed = sink.placed();
    assert_eq!(placed[0].name, "late.js");
    assert_eq!(placed[0].target, PlacementTarget::Body);
    assert_eq!(placed[1].target, PlacementTarget::Head);
}

#[tokio::test]
async fn explicit_key_collision_fails_fast() {
    let transport = ScriptedTransport::new();
    transport.serve("a.js", "").serve("b.js", "");
    let (loader, _sink) = loader(&transport);
    let pinned = DescriptorOverrides {
        key: Some("shared".try_into().unwrap()),
        ..DescriptorOverrides::default()
    };

    loader
        .require_with("a.js", pinned.clone(), ConfigPatch::default())
        .wait()
        .await
        .unwrap();
    let failure = loader
        .require_with("b.js", pinned, ConfigPatch::default())
        .wait()
        .await
        .unwrap_err();

    assert_eq!(failure.name, "b.js");
    assert!(matches!(
        failure.error,
        LoadError::DuplicateKeyCollision { .. }
    ));
}

#[tokio::test]
async fn late_registration_gets_settled_outcome() {
    let transport = ScriptedTransport::new();
    transport.serve("a.js", "");
    let (loader, _sink) = loader(&transport);
    let mut outcomes = Outcomes::new();

    let chain = loader.require("a.js");
    chain.clone().wait().await.unwrap();
    chain.then(outcomes.on_success(), outcomes.on_failure());

    assert_eq!(outcomes.next().await.unwrap(), names(&["a.js"]));
}

#[tokio::test]
async fn callback_can_start_another_chain() {
    let transport = ScriptedTransport::new();
    transport.serve("a.js", "").serve("b.js", "");
    let (loader, sink) = loader(&transport);
    let mut outcomes = Outcomes::new();

    let next = loader.clone();
    let on_success = outcomes.on_success();
    let on_failure = outcomes.on_failure();
    loader.require("a.js").on_success(move |_| {
        next.require("b.js").then(on_success, on_failure);
    });

    assert_eq!(outcomes.next().await.unwrap(), names(&["b.js"]));
    assert_eq!(sink.names(), names(&["a.js", "b.js"]));
}

#[tokio::test]
async fn stylesheets_are_not_scanned() {
    let transport = ScriptedTransport::new();
    transport.serve("theme.css", "/* @resources never.js */");
    let (loader, sink) = loader(&transport);

    let loaded = loader.require("theme.css").wait().await.unwrap();

    assert_eq!(loaded, names(&["theme.css"]));
    assert_eq!(transport.fetches("never.js"), 0);
    assert_eq!(sink.placed()[0].kind.as_str(), "style");
}

#[tokio::test]
async fn translation_uses_delimiter_and_extension() {
    let transport = ScriptedTransport::new();
    transport.serve("app/ui/Feedback.js", "");
    let config = LoaderConfig {
        delimiter: ".".into(),
        extension: Some(".js".into()),
        ..LoaderConfig::default()
    };
    let (loader, sink) = loader_with(&transport, config);

    let loaded = loader.require("app.ui.Feedback").wait().await.unwrap();

    assert_eq!(loaded, names(&["app.ui.Feedback"]));
    assert_eq!(sink.placed()[0].uri, "app/ui/Feedback.js");
}

#[tokio::test]
async fn chain_outlives_dropped_loader_handle() {
    let transport = ScriptedTransport::new();
    transport.serve_after("a.js", "", Duration::from_millis(20));
    let (loader, _sink) = loader(&transport);

    let chain = loader.require("a.js");
    drop(loader);

    // The chain holds its own handle.
    assert_eq!(chain.wait().await.unwrap(), names(&["a.js"]));
}

#[tokio::test]
async fn debug_lifecycle_does_not_change_outcome() {
    init_test_logging();
    let transport = ScriptedTransport::new();
    transport
        .serve("a.js", "// @resources b.js")
        .serve("b.js", "");
    let config = LoaderConfig {
        debug: DebugConfig { enabled: true },
        ..LoaderConfig::default()
    };
    let (loader, sink) = loader_with(&transport, config);

    let loaded = loader.require("a.js").wait().await.unwrap();

    assert_eq!(loaded, names(&["a.js", "b.js"]));
    assert_eq!(sink.names(), names(&["b.js", "a.js"]));
}
