mod common;

use std::time::Duration;

use common::{fast_settings, init_logging, plan_page};
use harvester_core::UrlGroup;
use harvester_engine::{EngineEvent, EngineHandle};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Drains events on a blocking thread until `Finished` or the channel closes.
async fn drain(handle: EngineHandle) -> Vec<EngineEvent> {
    tokio::task::spawn_blocking(move || {
        let mut events = Vec::new();
        while let Some(event) = handle.recv_timeout(Duration::from_secs(20)) {
            let done = matches!(event, EngineEvent::Finished { .. });
            events.push(event);
            if done {
                break;
            }
        }
        handle.join();
        events
    })
    .await
    .unwrap()
}

async fn plan_server(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fp"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(delay)
                .set_body_raw(
                    plan_page("Acme", "1", &[("openWindow('http://x/a.pdf')", "A")]),
                    "text/html",
                ),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test(flavor = "multi_thread")]
async fn groups_complete_in_order_then_finish() {
    init_logging();
    let server = plan_server(Duration::ZERO).await;
    let page = |n: u32| format!("{}/fp?c={n}", server.uri());
    let groups = vec![
        UrlGroup::new("east", [page(1), page(2)]),
        UrlGroup::new("west", [page(3)]),
    ];

    let events = drain(EngineHandle::start(fast_settings(), groups)).await;

    let completed: Vec<(&str, usize)> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::GroupCompleted { group, result } => Some((group.as_str(), result.success_count())),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![("east", 2), ("west", 1)]);
    assert_eq!(events.last(), Some(&EngineEvent::Finished { cancelled: false }));

    let east_progress: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Progress { group, update } if group == "east" => Some(update.percent),
            _ => None,
        })
        .collect();
    assert_eq!(east_progress.len(), 3);
    assert_eq!(east_progress.last().copied(), Some(100.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_is_idempotent_and_reported() {
    init_logging();
    let server = plan_server(Duration::from_millis(300)).await;
    let groups = vec![
        UrlGroup::new("first", (0..4).map(|n| format!("{}/fp?c={n}", server.uri()))),
        UrlGroup::new("second", [format!("{}/fp?c=9", server.uri())]),
    ];

    let handle = EngineHandle::start(fast_settings(), groups);
    handle.stop();
    handle.stop();
    assert!(handle.is_stopping());
    let events = drain(handle).await;

    assert_eq!(events.last(), Some(&EngineEvent::Finished { cancelled: true }));
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::GroupCompleted { group, .. } if group == "second")));
}

#[tokio::test(flavor = "multi_thread")]
async fn no_groups_finishes_immediately() {
    init_logging();
    let events = drain(EngineHandle::start(fast_settings(), Vec::new())).await;
    assert_eq!(events, vec![EngineEvent::Finished { cancelled: false }]);
}

#[tokio::test(flavor = "multi_thread")]
async fn external_token_stops_the_engine() {
    init_logging();
    let token = harvester_engine::CancellationToken::new();
    token.cancel();
    let groups = vec![UrlGroup::new("never", ["http://127.0.0.1:1/fp"])];

    let handle = EngineHandle::start_with_cancel(fast_settings(), groups, token);
    assert!(handle.is_stopping());
    let events = drain(handle).await;

    assert_eq!(events, vec![EngineEvent::Finished { cancelled: true }]);
}
