//! Every built-in scenario passes against the simulated switch and leaves
//! nothing behind.

use sai_harness::HarnessSettings;
use sai_testbed::{scenarios, SimConfig, Testbed};
use std::time::Duration;
use tokio_test::assert_ok;

fn settings() -> HarnessSettings {
    sai_harness::logging::init_for_tests();
    let mut settings = HarnessSettings::for_simulator();
    settings.target.ports = 8;
    settings
}

async fn run_clean(name: &str) {
    let mut tb = Testbed::start(settings()).await.unwrap();
    let before = tb.session.store().len();
    let scenario = scenarios::find(name).unwrap();

    if let Err(failure) = scenarios::run(&mut tb, scenario).await {
        panic!("{}", failure);
    }

    assert_eq!(tb.session.store().len(), before, "{} left objects behind", name);
    assert!(tb.session.undo_log().is_empty());
    assert_ok!(tb.finish().await);
}

#[tokio::test]
async fn test_route_add_remove() {
    run_clean("route_add_remove").await;
}

#[tokio::test]
async fn test_replay() {
    run_clean("replay").await;
}

#[tokio::test]
async fn test_glean() {
    run_clean("glean").await;
}

#[tokio::test]
async fn test_lpm() {
    run_clean("lpm").await;
}

#[tokio::test]
async fn test_vrf_isolation() {
    run_clean("vrf_isolation").await;
}

#[tokio::test]
async fn test_svi() {
    run_clean("svi").await;
}

#[tokio::test]
async fn test_ordering() {
    run_clean("ordering").await;
}

#[tokio::test]
async fn test_svi_ordering() {
    run_clean("svi_ordering").await;
}

#[tokio::test]
async fn test_ecmp_balance() {
    run_clean("ecmp_balance").await;
}

#[tokio::test]
async fn test_lag_balance() {
    run_clean("lag_balance").await;
}

#[tokio::test]
async fn test_drop_counters() {
    run_clean("drop_counters").await;
}

#[tokio::test]
async fn test_stress() {
    run_clean("stress").await;
}

#[tokio::test]
async fn test_negative_statuses() {
    run_clean("negative_statuses").await;
}

#[tokio::test]
async fn test_scenarios_converge_with_apply_delay() {
    let settings = settings();
    let config = SimConfig::from_settings(&settings).with_apply_delay(Duration::from_millis(5));
    let mut tb = Testbed::with_sim(config, settings).await.unwrap();

    for name in ["route_add_remove", "lpm", "glean"] {
        let scenario = scenarios::find(name).unwrap();
        if let Err(failure) = scenarios::run(&mut tb, scenario).await {
            panic!("{}", failure);
        }
    }
    assert_ok!(tb.finish().await);
}

#[tokio::test]
async fn test_too_few_ports_fails_cleanly() {
    let mut settings = settings();
    settings.target.ports = 2;
    let mut tb = Testbed::start(settings).await.unwrap();
    let before = tb.session.store().len();

    let failure = scenarios::run(&mut tb, scenarios::find("ecmp_balance").unwrap())
        .await
        .unwrap_err();
    assert_eq!(failure.scenario, "ecmp_balance");
    assert!(failure.error.to_string().contains("front-panel ports"));
    assert_eq!(tb.session.store().len(), before);
    assert_ok!(tb.finish().await);
}
