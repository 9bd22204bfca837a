mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FakeProcesses, Faults, MockController};
use scanfleet::{
    BrowserInstance, DriverError, FatalErrorKind, FleetConfig, HealthAssessor, HealthStatus,
    Recommendation,
};

fn assessor(processes: &Arc<FakeProcesses>) -> HealthAssessor {
    HealthAssessor::new(processes.clone(), FleetConfig::default().health_options())
}

fn instance(controller: &Arc<MockController>) -> BrowserInstance {
    BrowserInstance::new(1, controller.clone())
}

#[tokio::test]
async fn healthy_instance_reports_healthy() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);
    controller.add_surface();

    let report = assessor(&processes).assess(Some(&instance(&controller))).await;

    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.is_healthy());
    assert!(!report.critical);
    assert!(report.recommendations.is_empty());
    assert_eq!(report.page_count, 2);
    assert!(report.connectivity.connected && report.connectivity.protocol_responsive);
}

#[tokio::test]
async fn throwaway_probe_surfaces_are_closed() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);

    assessor(&processes).assess(Some(&instance(&controller))).await;

    // round-trip and network probes each open one surface
    assert_eq!(controller.opened.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(controller.open_surface_count(), 1);
}

#[tokio::test]
async fn missing_instance_is_critical() {
    let processes = FakeProcesses::new();
    let report = assessor(&processes).assess(None).await;

    assert!(report.critical);
    assert_eq!(report.status, HealthStatus::Critical);
    assert!(!report.is_healthy());
}

#[tokio::test]
async fn instance_without_pid_is_critical() {
    let processes = FakeProcesses::new();
    let controller = MockController::without_pid(&processes);

    let report = assessor(&processes).assess(Some(&instance(&controller))).await;
    assert!(report.critical);
    assert_eq!(report.status, HealthStatus::Critical);
}

#[tokio::test]
async fn fatal_round_trip_error_is_critical() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);
    controller.set_faults(Faults {
        navigate_error: Some(DriverError::from_cdp("Session closed. Most likely the page has been closed.")),
        ..Faults::default()
    });

    let report = assessor(&processes).assess(Some(&instance(&controller))).await;

    assert!(report.critical);
    assert_eq!(report.status, HealthStatus::Critical);
    assert_eq!(report.fatal_error, Some(FatalErrorKind::SessionClosed));
    // network probe does not navigate and still passes
    assert!(report.network_capable);
}

#[tokio::test]
async fn unclassified_round_trip_error_recommends_restart() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);
    controller.set_faults(Faults {
        navigate_error: Some(DriverError::from_cdp("net::ERR_ABORTED")),
        ..Faults::default()
    });

    let report = assessor(&processes).assess(Some(&instance(&controller))).await;

    assert!(!report.critical);
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(matches!(report.recommendations[0], Recommendation::RestartRequired { .. }));
    assert!(report.recommendations.iter().any(Recommendation::forces_restart));
}

#[tokio::test]
async fn interception_failure_gates_healthy() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);
    controller.set_faults(Faults {
        interception_error: Some(DriverError::from_cdp("Fetch.enable: Internal error")),
        ..Faults::default()
    });

    let report = assessor(&processes).assess(Some(&instance(&controller))).await;

    assert!(!report.network_capable);
    assert!(!report.is_healthy());
    assert!(!report.critical);
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(matches!(
        report.recommendations.as_slice(),
        [Recommendation::NetworkUnavailable { .. }]
    ));
}

#[tokio::test]
async fn fatal_interception_failure_is_critical() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);
    controller.set_faults(Faults {
        interception_error: Some(DriverError::from_cdp("Network.enable timed out")),
        ..Faults::default()
    });

    let report = assessor(&processes).assess(Some(&instance(&controller))).await;

    assert!(report.critical);
    assert_eq!(report.fatal_error, Some(FatalErrorKind::NetworkTimeout));
}

#[tokio::test(start_paused = true)]
async fn slow_version_probe_marks_unresponsive_and_disconnected() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);
    controller.set_faults(Faults {
        version_delay: Some(Duration::from_secs(30)),
        ..Faults::default()
    });

    let report = assessor(&processes).assess(Some(&instance(&controller))).await;

    assert!(!report.critical);
    assert!(!report.connectivity.protocol_responsive);
    assert_eq!(report.status, HealthStatus::Disconnected);
    assert!(
        report
            .recommendations
            .iter()
            .any(|r| matches!(r, Recommendation::Unresponsive { .. }))
    );
    assert!(report.response_time >= Duration::from_secs(8));
}

#[tokio::test]
async fn dropped_transport_is_disconnected() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);
    controller.connected.store(false, std::sync::atomic::Ordering::SeqCst);

    let report = assessor(&processes).assess(Some(&instance(&controller))).await;
    assert_eq!(report.status, HealthStatus::Disconnected);
    assert!(!report.connectivity.connected);
}

#[tokio::test]
async fn high_memory_is_a_recommendation_not_critical() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);
    processes.update(100, |p| p.rss = 3 * 1024 * 1024 * 1024);

    let report = assessor(&processes).assess(Some(&instance(&controller))).await;

    assert!(!report.critical);
    assert_eq!(report.status, HealthStatus::Degraded);
    assert!(matches!(
        report.recommendations.as_slice(),
        [Recommendation::HighMemory { .. }]
    ));
}

#[tokio::test]
async fn quick_check_follows_liveness_and_version() {
    let processes = FakeProcesses::new();
    let controller = MockController::spawn(&processes, 100);
    let assessor = assessor(&processes);
    let instance = instance(&controller);

    assert!(assessor.quick_check(&instance).await);

    controller.set_faults(Faults {
        version_error: Some(DriverError::from_cdp("Connection closed")),
        ..Faults::default()
    });
    assert!(!assessor.quick_check(&instance).await);
}
