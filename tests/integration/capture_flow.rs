//! Integration tests for the capture gate
//!
//! Tests the flow: capture -> locate -> register/resolve -> policy -> redact -> ship

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use snapline::redact::{REDACTED, SENSITIVE_VARIABLE_NAME};
use snapline::{
    vars, Agent, CallerLocator, CaptureOutcome, CaptureTicket, CaptureValue, FixedFrameResolver,
    MockControlPlane, RecordingTransport, RegistrationPolicy, Severity, SkipReason,
    TaskLocalContext,
};

use super::common::{self, armed, harness, harness_with, FILE, FUNCTION, LINE};

/// Test that an armed breakpoint produces one redacted snapshot
#[tokio::test]
async fn test_armed_breakpoint_ships_redacted_snapshot() {
    let h = harness(MockControlPlane::new().with_breakpoints(vec![armed("bp-1", "pre-charge")]));
    assert!(h.agent.sync_now().await);

    let outcome = h
        .agent
        .capture(
            "pre-charge",
            vars! {
                "order_id" => 1042,
                "password" => "s3cr3t!",
                "note" => "token=AAAAAAAAAAAAAAAAAAAA1234",
                "conn" => CaptureValue::opaque::<std::net::TcpStream>(),
            },
        )
        .outcome()
        .await;
    assert!(outcome.is_captured(), "unexpected outcome {outcome:?}");

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    let snapshot = &sent[0];
    assert_eq!(outcome, CaptureOutcome::Captured { snapshot_id: snapshot.id });
    assert_eq!(snapshot.breakpoint_id, "bp-1");
    assert_eq!(snapshot.service, common::SERVICE);
    assert_eq!(snapshot.label, "pre-charge");
    assert_eq!(snapshot.location.file_path, FILE);
    assert_eq!(snapshot.location.line_number, LINE);
    assert_eq!(snapshot.location.function_name, FUNCTION);

    assert_eq!(snapshot.variables["order_id"], json!(1042));
    assert_eq!(snapshot.variables["password"], json!(REDACTED));
    assert_eq!(snapshot.variables["note"], json!(REDACTED));
    assert_eq!(snapshot.variables["conn"], json!("[object]"));

    let findings: Vec<_> = snapshot
        .findings
        .iter()
        .map(|f| (f.variable.as_str(), f.category.as_str(), f.severity))
        .collect();
    assert_eq!(
        findings,
        vec![
            ("note", "sensitive_data_api_key", Severity::High),
            ("password", SENSITIVE_VARIABLE_NAME, Severity::Medium),
        ]
    );

    // Already known from the sync: no registration traffic.
    assert!(h.control_plane.registrations().is_empty());
    assert_eq!(h.agent.stats().captured, 1);
}

/// Test that concurrent first captures at one call site register only once
#[tokio::test]
async fn test_concurrent_first_captures_register_once() {
    let h = harness(MockControlPlane::new().with_registration_delay(Duration::from_millis(50)));

    let first = h.agent.capture("cart-total", vars! { "total" => 99 });
    let second = h.agent.capture("cart-total", vars! { "total" => 100 });
    let outcomes = vec![first.outcome().await, second.outcome().await];

    assert_eq!(h.control_plane.registrations().len(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.is_captured()).count(), 1);
    assert!(outcomes.contains(&CaptureOutcome::Skipped(SkipReason::RegistrationPending)));

    // Later calls find the seeded cache entry without registering again.
    let third = h.agent.capture("cart-total", vars! {}).outcome().await;
    assert!(third.is_captured());

    let registrations = h.control_plane.registrations();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].service, common::SERVICE);
    assert_eq!(registrations[0].function_name, FUNCTION);
    assert_eq!(registrations[0].file_path, FILE);
    assert_eq!(registrations[0].line_number, LINE);
    assert_eq!(registrations[0].label, "cart-total");
}

/// Test that two labels captured from one line register and resolve separately
#[tokio::test]
async fn test_labels_sharing_a_line_register_separately() {
    let h = harness(MockControlPlane::new());

    assert!(h.agent.capture("label-a", vars! {}).outcome().await.is_captured());
    assert!(h.agent.capture("label-b", vars! {}).outcome().await.is_captured());

    let labels: Vec<_> = h
        .control_plane
        .registrations()
        .into_iter()
        .map(|r| r.label)
        .collect();
    assert_eq!(labels, ["label-a", "label-b"]);

    let sent: Vec<_> = h
        .transport
        .sent()
        .into_iter()
        .map(|s| (s.label, s.breakpoint_id))
        .collect();
    assert_eq!(sent[0].0, "label-a");
    assert_eq!(sent[1].0, "label-b");
    assert_ne!(sent[0].1, sent[1].1);
}

/// Test that another label's breakpoint at the same line does not gate a capture
#[tokio::test]
async fn test_other_labels_policy_does_not_apply() {
    let h = harness(
        MockControlPlane::new().with_breakpoints(vec![armed("bp-a", "label-a").disabled()]),
    );
    h.agent.sync_now().await;

    let outcome = h.agent.capture("label-b", vars! {}).outcome().await;
    assert!(outcome.is_captured(), "unexpected outcome {outcome:?}");
    assert_eq!(h.control_plane.registrations().len(), 1);
    assert_ne!(h.transport.sent()[0].breakpoint_id, "bp-a");

    let outcome = h.agent.capture("label-a", vars! {}).outcome().await;
    assert_eq!(outcome, CaptureOutcome::Skipped(SkipReason::Disabled));
}

/// Test that a sync returning nothing disarms every previously cached breakpoint
#[tokio::test]
async fn test_empty_sync_disarms_previous_breakpoints() {
    let h = harness(MockControlPlane::new().with_breakpoints(vec![armed("bp-1", "pre-charge")]));
    h.agent.sync_now().await;
    assert!(h.agent.capture("pre-charge", vars! {}).outcome().await.is_captured());

    h.control_plane.set_breakpoints(Vec::new());
    assert!(h.agent.sync_now().await);

    let outcome = h.agent.capture("pre-charge", vars! {}).outcome().await;
    assert_eq!(outcome, CaptureOutcome::Skipped(SkipReason::NotConfigured));
    assert!(h.control_plane.registrations().is_empty());
    assert_eq!(h.transport.sent_count(), 1);
}

/// Test the policy checks: budget, expiry, disabled
#[tokio::test]
async fn test_policy_skips_never_ship() {
    let cases = [
        (
            armed("bp-budget", "x").with_budget(3, 3),
            SkipReason::BudgetExhausted,
        ),
        (
            armed("bp-expired", "x")
                .with_budget(10, 0)
                .expiring_at(Utc::now() - chrono::Duration::minutes(1)),
            SkipReason::Expired,
        ),
        (armed("bp-off", "x").disabled(), SkipReason::Disabled),
    ];

    for (breakpoint, expected) in cases {
        let h = harness(MockControlPlane::new().with_breakpoints(vec![breakpoint]));
        h.agent.sync_now().await;

        for _ in 0..3 {
            let outcome = h.agent.capture("x", vars! { "n" => 1 }).outcome().await;
            assert_eq!(outcome, CaptureOutcome::Skipped(expected));
        }
        assert_eq!(h.transport.sent_count(), 0);
        assert_eq!(h.agent.stats().skipped, 3);
    }
}

/// Test that registration failures stay inside the agent and are retried
#[tokio::test]
async fn test_registration_failure_is_contained_and_retried() {
    let h = harness(MockControlPlane::new());
    h.control_plane.fail_registrations(true);

    for _ in 0..2 {
        let outcome = h.agent.capture("retry", vars! {}).outcome().await;
        assert_eq!(outcome, CaptureOutcome::Skipped(SkipReason::RegistrationFailed));
    }
    assert_eq!(h.control_plane.registrations().len(), 2);
    assert_eq!(h.agent.stats().registration_failures, 2);

    h.control_plane.fail_registrations(false);
    assert!(h.agent.capture("retry", vars! {}).outcome().await.is_captured());
    assert_eq!(h.control_plane.registrations().len(), 3);
}

/// Test that the fencing policy stops registration attempts
#[tokio::test]
async fn test_fenced_registration_stops_calling_the_control_plane() {
    let control_plane = MockControlPlane::new();
    control_plane.fail_registrations(true);
    let h = harness_with(
        control_plane,
        RecordingTransport::new(),
        common::config().with_registration(RegistrationPolicy::fence_after(1)),
    );

    let first = h.agent.capture("fragile", vars! {}).outcome().await;
    let second = h.agent.capture("fragile", vars! {}).outcome().await;
    assert_eq!(first, CaptureOutcome::Skipped(SkipReason::RegistrationFailed));
    assert_eq!(second, CaptureOutcome::Skipped(SkipReason::RegistrationFenced));
    assert_eq!(h.control_plane.registrations().len(), 1);
}

/// Test that a transport failure is logged, counted and forgotten
#[tokio::test]
async fn test_transport_failure_does_not_escape() {
    let h = harness_with(
        MockControlPlane::new().with_breakpoints(vec![armed("bp-1", "ship")]),
        RecordingTransport::failing(),
        common::config(),
    );
    h.agent.sync_now().await;

    let outcome = h.agent.capture("ship", vars! { "a" => 1 }).outcome().await;
    assert_eq!(outcome, CaptureOutcome::ShipFailed);
    assert_eq!(h.agent.stats().ship_failures, 1);

    h.transport.set_failing(false);
    assert!(h.agent.capture("ship", vars! {}).outcome().await.is_captured());
    assert_eq!(h.transport.sent_count(), 1);
}

/// Test that a stalled transport is bounded by the request timeout
#[tokio::test(start_paused = true)]
async fn test_stalled_transport_times_out() {
    let h = harness_with(
        MockControlPlane::new().with_breakpoints(vec![armed("bp-1", "slow")]),
        RecordingTransport::new().with_delay(Duration::from_secs(60)),
        common::config(),
    );
    h.agent.sync_now().await;

    let outcome = h.agent.capture("slow", vars! {}).outcome().await;
    assert_eq!(outcome, CaptureOutcome::ShipFailed);
}

/// Test that request context and correlation ids are attached
#[tokio::test]
async fn test_ambient_context_is_attached() {
    let control_plane = Arc::new(
        MockControlPlane::new().with_breakpoints(vec![armed("bp-ctx", "with-context")]),
    );
    let transport = Arc::new(RecordingTransport::new());
    let agent = Agent::builder(common::config())
        .control_plane(control_plane.clone())
        .transport(transport.clone())
        .context_provider(Arc::new(TaskLocalContext))
        .locator(common::fixed_locator())
        .build()
        .unwrap();
    agent.sync_now().await;

    let context: BTreeMap<String, String> = [
        ("trace_id", "4bf92f3577b34da6a3ce929d0e0e4736"),
        ("span_id", "00f067aa0ba902b7"),
        ("route", "/cart/checkout"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let ticket = TaskLocalContext::scope(context, async {
        agent.capture("with-context", vars! { "items" => 3 })
    })
    .await;
    assert!(ticket.outcome().await.is_captured());

    let snapshot = &transport.sent()[0];
    assert_eq!(
        snapshot.trace_id.as_deref(),
        Some("4bf92f3577b34da6a3ce929d0e0e4736")
    );
    assert_eq!(snapshot.span_id.as_deref(), Some("00f067aa0ba902b7"));
    assert_eq!(
        snapshot
            .request_context
            .as_ref()
            .and_then(|c| c.get("route"))
            .map(String::as_str),
        Some("/cart/checkout")
    );
}

/// Test that the kill switch skips before touching anything
#[tokio::test]
async fn test_disabled_agent_does_nothing() {
    let mut config = common::config();
    config.enabled = false;
    let h = harness_with(MockControlPlane::new(), RecordingTransport::new(), config);

    let ticket = h.agent.capture("anything", vars! { "x" => 1 });
    assert!(ticket.is_ready());
    assert_eq!(
        ticket.outcome().await,
        CaptureOutcome::Skipped(SkipReason::AgentDisabled)
    );
    assert!(h.control_plane.registrations().is_empty());
}

/// Test that an unresolvable stack skips silently by default
#[tokio::test]
async fn test_missing_location_skips_silently() {
    let control_plane = Arc::new(MockControlPlane::new());
    let agent = Agent::builder(common::config())
        .control_plane(control_plane.clone())
        .transport(Arc::new(RecordingTransport::new()))
        .locator(CallerLocator::new(Arc::new(FixedFrameResolver::empty())))
        .build()
        .unwrap();

    let outcome = agent.capture("nowhere", vars! {}).outcome().await;
    assert_eq!(outcome, CaptureOutcome::Skipped(SkipReason::NoLocation));
    assert!(control_plane.registrations().is_empty());
}

/// Test that the `#[track_caller]` location stands in for an empty stack
#[tokio::test]
async fn test_track_caller_location_is_the_fallback() {
    let control_plane = Arc::new(MockControlPlane::new());
    let transport = Arc::new(RecordingTransport::new());
    let mut config = common::config();
    config.caller_fallback = true;
    let agent = Agent::builder(config)
        .control_plane(control_plane.clone())
        .transport(transport.clone())
        .locator(CallerLocator::new(Arc::new(FixedFrameResolver::empty())))
        .build()
        .unwrap();

    let expected_line = line!() + 1;
    let outcome = agent.capture("fallback", vars! {}).outcome().await;
    assert!(outcome.is_captured());

    let registration = &control_plane.registrations()[0];
    assert!(registration.file_path.ends_with("capture_flow.rs"));
    assert_eq!(registration.line_number, expected_line);
    assert_eq!(registration.function_name, "anonymous");
    assert_eq!(transport.sent()[0].location.line_number, expected_line);
}

#[inline(never)]
fn capture_from_helper(agent: &Agent) -> CaptureTicket {
    agent.capture("helper", vars! { "depth" => 1 })
}

/// Test the real backtrace resolver lands on the application frame
#[tokio::test]
async fn test_backtrace_locator_finds_the_calling_function() {
    let control_plane = Arc::new(MockControlPlane::new());
    let transport = Arc::new(RecordingTransport::new());
    let agent = Agent::builder(common::config())
        .control_plane(control_plane.clone())
        .transport(transport.clone())
        .build()
        .unwrap();

    assert!(capture_from_helper(&agent).outcome().await.is_captured());

    let location = &transport.sent()[0].location;
    assert_eq!(location.function_name, "capture_from_helper");
    assert!(
        location.file_path.ends_with("capture_flow.rs"),
        "resolved {}",
        location.file_path
    );
    assert!(!transport.sent()[0].stack_trace.is_empty());
}

/// Test that calling capture outside a runtime is a quiet no-op
#[test]
fn test_capture_without_runtime_is_skipped() {
    let h = harness(MockControlPlane::new());

    let ticket = h.agent.capture("sync-context", vars! { "x" => 1 });
    assert!(ticket.is_ready());
    assert_eq!(
        futures::executor::block_on(ticket.outcome()),
        CaptureOutcome::Skipped(SkipReason::NoRuntime)
    );
}
