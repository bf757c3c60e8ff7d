use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use volley_core::metrics::{Field, MetricValue};
use volley_core::runner::Error;
use volley_core::suite::{Predicate, TestCase};
use volley_core::{Progress, ProgressFn, RunScope, RunSpec, Runner, Status};
use volley_http::{EventName, HttpRequest};
use volley_testserver::TestServer;

fn spec(request: HttpRequest, requests: i64, concurrency: usize) -> RunSpec {
    RunSpec {
        request,
        requests,
        concurrency,
        interval: Duration::ZERO,
        request_timeout: Duration::from_secs(2),
        global_timeout: Duration::from_secs(10),
        tests: Vec::new(),
    }
}

fn case(name: &str, field: &str, predicate: Predicate, target: MetricValue) -> TestCase {
    TestCase {
        name: name.to_string(),
        field: Field::new(field),
        predicate,
        target,
    }
}

#[tokio::test]
async fn run_produces_report_with_metrics_and_tests() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    let request = HttpRequest::post(&server.urls().echo, "ping".into()).with_header("x-test", "1");
    let mut spec = spec(request, 8, 2);
    spec.tests = vec![
        case("all sent", "RequestCount", Predicate::Eq, MetricValue::Int(8)),
        case(
            "all ok",
            "StatusCodesDistribution.200",
            Predicate::Eq,
            MetricValue::Int(8),
        ),
        case(
            "fast enough",
            "ResponseTimes.Max",
            Predicate::Lt,
            MetricValue::Duration(Duration::from_secs(2)),
        ),
        case(
            "impossible",
            "RequestFailureCount",
            Predicate::Gt,
            MetricValue::Int(0),
        ),
    ];

    let runner = Runner::new();
    let report = runner
        .run(&RunScope::new(), spec)
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(report.metrics.request_count(), 8);
    assert_eq!(report.metrics.request_failure_count(), 0);
    assert!(
        report
            .metrics
            .request_event_times
            .contains_key(&EventName::BodyRead)
    );
    assert_eq!(server.stats().saw_post_header(), 8);
    assert_eq!(server.stats().saw_post_body(), 8);

    assert!(!report.tests.pass);
    let passes: Vec<bool> = report.tests.cases.iter().map(|c| c.pass).collect();
    assert_eq!(passes, vec![true, true, true, false]);
    assert_eq!(
        report.tests.cases[3].summary,
        "want RequestFailureCount > 0, got 0"
    );

    assert!(report.metadata.total_duration > Duration::ZERO);
    assert!(runner.progress().is_none());

    let json = serde_json::to_value(&report).unwrap_or_else(|e| panic!("serialize: {e}"));
    assert_eq!(json["metrics"]["RequestCount"], 8);
    assert_eq!(json["metadata"]["spec"]["requests"], 8);
    assert!(json["metadata"]["finishedAt"].is_string());
    assert!(json["metadata"]["totalDuration"].is_u64());
}

#[tokio::test]
async fn progress_is_observable_while_running() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    let frames = Arc::new(AtomicUsize::new(0));
    let seen = frames.clone();
    let on_progress: ProgressFn = Arc::new(move |p: Progress| {
        assert!(p.to_string().contains("/4 "));
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let runner = Arc::new(Runner::new().with_progress(on_progress));

    let spec = spec(HttpRequest::get(&server.urls().slow_ms(50)), 4, 1);
    let task = {
        let runner = runner.clone();
        tokio::spawn(async move { runner.run(&RunScope::new(), spec).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    let live = runner
        .progress()
        .unwrap_or_else(|| panic!("expected an active run"));
    assert_eq!(live.status(), Status::Running);

    let report = task
        .await
        .unwrap_or_else(|e| panic!("join: {e}"))
        .unwrap_or_else(|e| panic!("run failed: {e}"));
    assert_eq!(report.metrics.request_count(), 4);
    assert!(frames.load(Ordering::SeqCst) >= 5);
    assert!(runner.progress().is_none());
}

#[tokio::test]
async fn cancel_yields_partial_report() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    let mut spec = spec(HttpRequest::get(&server.urls().hello), -1, 2);
    spec.interval = Duration::from_millis(10);

    let scope = RunScope::new();
    let canceller = scope.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        canceller.cancel();
    });

    match Runner::new().run(&scope, spec).await {
        Err(Error::Canceled(report)) => {
            assert!(report.metrics.request_count() > 0);
            assert!(report.tests.pass);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_target_is_a_connection_error() {
    let spec = spec(HttpRequest::get("http://127.0.0.1:1/"), 1, 1);
    match Runner::new().run(&RunScope::new(), spec).await {
        Err(Error::Connection(_)) => {}
        other => panic!("expected connection error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_spec_is_rejected_before_any_request() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    let spec = spec(HttpRequest::get(&server.urls().hello), 2, 5);
    match Runner::new().run(&RunScope::new(), spec).await {
        Err(Error::InvalidSpec(issues)) => assert_eq!(issues.len(), 1),
        other => panic!("expected invalid spec, got {other:?}"),
    }
    assert_eq!(server.stats().requests_total(), 0);
}
