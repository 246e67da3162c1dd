use std::sync::Arc;

use crate::RequestDescriptor;
use crate::tests::test_support::{
    REFRESH_PATH, ScriptedTransport, capture_logs, config, dispatcher_with, expiring_api,
    wait_until,
};

#[tokio::test(flavor = "current_thread")]
async fn refresh_mid_flight_replays_in_enqueue_order() {
    let transport = ScriptedTransport::new(expiring_api("T2"));
    let refresh_gate = transport.gate(|req| req.url.ends_with(REFRESH_PATH));
    let (dispatcher, store) = dispatcher_with(transport.clone(), Some("T1"), config());
    let mut loading = dispatcher.loading();

    let a = tokio::spawn({
        let d = dispatcher.clone();
        async move { d.get("/me").await }
    });
    wait_until(|| transport.refresh_calls() == 1).await;
    assert!(dispatcher.is_refreshing());
    assert!(dispatcher.is_loading());

    let b = tokio::spawn({
        let d = dispatcher.clone();
        async move { d.get("/profile").await }
    });
    wait_until(|| dispatcher.queue_len() == 2).await;
    let queued: Vec<String> = dispatcher
        .coordinator()
        .queued()
        .iter()
        .map(|d| d.endpoint().to_string())
        .collect();
    assert_eq!(queued, vec!["/me", "/profile"]);
    // B never reached the transport while the refresh was running
    assert_eq!(transport.sent().len(), 1);

    refresh_gate.open(1);
    let a = a.await.unwrap().expect("A resolves");
    let b = b.await.unwrap().expect("B resolves");
    assert_eq!(a.status, 200);
    assert_eq!(b.status, 200);

    assert_eq!(transport.refresh_calls(), 1);
    assert_eq!(
        transport.sent(),
        vec![
            ("/me".to_string(), Some("T1".to_string())),
            ("/me".to_string(), Some("T2".to_string())),
            ("/profile".to_string(), Some("T2".to_string())),
        ]
    );
    assert_eq!(store_value(&store), Some("T2".to_string()));
    assert!(!dispatcher.is_refreshing());
    assert_eq!(dispatcher.queue_len(), 0);
    assert!(!*loading.borrow_and_update());
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_expiries_collapse_into_one_refresh() {
    const N: usize = 8;
    let transport = ScriptedTransport::new(expiring_api("T2"));
    let stale_gate =
        transport.gate(|req| req.bearer() == Some("T1") && !req.url.ends_with(REFRESH_PATH));
    let refresh_gate = transport.gate(|req| req.url.ends_with(REFRESH_PATH));
    let (dispatcher, _store) = dispatcher_with(transport.clone(), Some("T1"), config());

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let d = dispatcher.clone();
            tokio::spawn(async move { d.get(format!("/items/{i}")).await })
        })
        .collect();
    wait_until(|| transport.sent().len() == N).await;

    stale_gate.open(N);
    wait_until(|| dispatcher.queue_len() == N && transport.refresh_calls() == 1).await;
    let enqueued: Vec<String> = dispatcher
        .coordinator()
        .queued()
        .iter()
        .map(|d| d.endpoint().to_string())
        .collect();

    refresh_gate.open(1);
    for handle in handles {
        let resp = handle.await.unwrap().expect("replayed call resolves");
        assert_eq!(resp.status, 200);
    }

    assert_eq!(transport.refresh_calls(), 1);
    let replayed: Vec<(String, Option<String>)> = transport.sent().split_off(N);
    assert_eq!(replayed.len(), N);
    assert!(replayed.iter().all(|(_, bearer)| bearer.as_deref() == Some("T2")));
    let replay_order: Vec<String> = replayed.into_iter().map(|(path, _)| path).collect();
    assert_eq!(replay_order, enqueued);
    assert!(!dispatcher.is_loading());
}

#[tokio::test(flavor = "current_thread")]
async fn identical_queued_calls_settle_independently() {
    let transport = ScriptedTransport::new(expiring_api("T2"));
    let refresh_gate = transport.gate(|req| req.url.ends_with(REFRESH_PATH));
    let (dispatcher, _store) = dispatcher_with(transport.clone(), Some("T1"), config());

    let first = tokio::spawn({
        let d = dispatcher.clone();
        async move { d.execute(RequestDescriptor::get("/me")).await }
    });
    wait_until(|| dispatcher.is_refreshing()).await;
    let second = tokio::spawn({
        let d = dispatcher.clone();
        async move { d.execute(RequestDescriptor::get("/me")).await }
    });
    wait_until(|| dispatcher.queue_len() == 2).await;
    refresh_gate.open(1);

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    // each body carries the sequence number of its own transport exchange
    assert_ne!(first.body, second.body);
    assert!(first.body.starts_with("/me#"));
    assert!(second.body.starts_with("/me#"));
    assert_eq!(transport.sent().len(), 3);
}

#[tokio::test(flavor = "current_thread")]
async fn late_expiry_with_replaced_token_resends_without_refresh() {
    let transport = ScriptedTransport::new(expiring_api("T2"));
    let slow_gate = transport.gate(|req| req.url.ends_with("/slow") && req.bearer() == Some("T1"));
    let (dispatcher, _store) = dispatcher_with(transport.clone(), Some("T1"), config());

    let slow = tokio::spawn({
        let d = dispatcher.clone();
        async move { d.get("/slow").await }
    });
    wait_until(|| transport.sent().len() == 1).await;

    let fast = dispatcher.get("/fast").await.expect("fast resolves");
    assert_eq!(fast.status, 200);
    assert_eq!(transport.refresh_calls(), 1);

    slow_gate.open(1);
    let slow = slow.await.unwrap().expect("slow resolves");
    assert_eq!(slow.status, 200);
    assert_eq!(transport.refresh_calls(), 1);
    let last = transport.sent().pop().unwrap();
    assert_eq!(last, ("/slow".to_string(), Some("T2".to_string())));
}

#[tokio::test(flavor = "current_thread")]
async fn refresh_survives_dropped_leader() {
    let transport = ScriptedTransport::new(expiring_api("T2"));
    let refresh_gate = transport.gate(|req| req.url.ends_with(REFRESH_PATH));
    let (dispatcher, _store) = dispatcher_with(transport.clone(), Some("T1"), config());

    let leader = tokio::spawn({
        let d = dispatcher.clone();
        async move { d.get("/me").await }
    });
    wait_until(|| transport.refresh_calls() == 1).await;
    let follower = tokio::spawn({
        let d = dispatcher.clone();
        async move { d.get("/profile").await }
    });
    wait_until(|| dispatcher.queue_len() == 2).await;

    leader.abort();
    refresh_gate.open(1);
    let follower = follower.await.unwrap().expect("follower replayed");
    assert_eq!(follower.status, 200);
    assert!(!dispatcher.is_refreshing());
    assert_eq!(dispatcher.queue_len(), 0);
    wait_until(|| !dispatcher.is_loading()).await;
}

fn store_value(store: &Arc<crate::MemoryTokenStore>) -> Option<String> {
    use crate::TokenStore;
    store.get().map(|c| c.value().to_string())
}

#[tokio::test(flavor = "current_thread")]
async fn outcome_log_reports_refresh_cycles() {
    let transport = ScriptedTransport::new(expiring_api("T2"));
    let (dispatcher, _store) = dispatcher_with(transport.clone(), Some("T1"), config());

    let (lines, guard) = capture_logs();
    let replayed = dispatcher.get("/me").await.expect("replayed");
    let direct = dispatcher.get("/profile").await.expect("direct");
    drop(guard);

    assert_eq!(replayed.status, 200);
    assert_eq!(direct.status, 200);
    assert_eq!(transport.refresh_calls(), 1);

    let logs = lines.lock().unwrap().clone();
    let outcome = |endpoint: &str| {
        logs.iter()
            .find(|line| {
                line.contains("dispatch.outcome") && line.contains(&format!("endpoint={endpoint}"))
            })
            .cloned()
            .unwrap_or_else(|| panic!("no dispatch.outcome for {endpoint}: {logs:?}"))
    };
    assert!(outcome("/me").contains("cycles=1"));
    assert!(outcome("/profile").contains("cycles=0"));
}
