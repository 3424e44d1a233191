//! Dispatcher behavior against a recording client and a fixed sampler.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use shadowtraffic::config::model::{Config, ShadowConfig};
use shadowtraffic::config::ConfigAccessor;
use shadowtraffic::error::{DispatchError, ShadowCallError};
use shadowtraffic::pool::WorkerPool;
use shadowtraffic::shadow::capture::CapturedBody;
use shadowtraffic::shadow::client::{ShadowClient, ShadowRequest};
use shadowtraffic::shadow::dispatcher::DispatchOutcome;
use shadowtraffic::shadow::sampler::Sampler;
use shadowtraffic::shadow::{RequestMeta, RequestSnapshot, ShadowDispatcher};

struct FixedConfig(Option<Arc<Config>>);

#[async_trait]
impl ConfigAccessor for FixedConfig {
    async fn current(&self) -> Option<Arc<Config>> {
        self.0.clone()
    }
}

struct FixedSampler(u32);

impl Sampler for FixedSampler {
    fn draw(&self) -> u32 {
        self.0
    }
}

#[derive(Default)]
struct RecordingClient {
    sent: Mutex<Vec<ShadowRequest>>,
    failing_hosts: HashSet<String>,
}

#[async_trait]
impl ShadowClient for RecordingClient {
    async fn send(&self, request: ShadowRequest) -> Result<StatusCode, ShadowCallError> {
        let host = request.url.host_str().unwrap_or_default().to_string();
        self.sent.lock().unwrap().push(request);
        if self.failing_hosts.contains(&host) {
            Err(ShadowCallError::Timeout(std::time::Duration::from_millis(300)))
        } else {
            Ok(StatusCode::OK)
        }
    }
}

fn shadow_config(percentage: i32, hosts: &[&str]) -> Config {
    Config {
        upstream: None,
        shadow: ShadowConfig {
            enabled: true,
            percentage,
            hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
            ..ShadowConfig::default()
        },
    }
}

fn dispatcher(
    config: Option<Config>,
    client: Arc<RecordingClient>,
    draw: u32,
) -> ShadowDispatcher {
    ShadowDispatcher::new(
        Arc::new(FixedConfig(config.map(Arc::new))),
        client,
        WorkerPool::new("dispatch", 2),
        WorkerPool::new("http", 2),
        "test-box".into(),
    )
    .with_sampler(Arc::new(FixedSampler(draw)))
}

fn snapshot(method: &str, query: Option<&str>, body: CapturedBody) -> (RequestSnapshot, RequestMeta) {
    let snapshot = RequestSnapshot {
        method: method.into(),
        path: "/hotels".into(),
        query: query.map(String::from),
        headers: HeaderMap::new(),
        body,
    };
    let meta = RequestMeta {
        method: method.into(),
        uri: "/hotels".into(),
    };
    (snapshot, meta)
}

fn raw(body: &'static str) -> CapturedBody {
    CapturedBody::Raw(Bytes::from_static(body.as_bytes()))
}

#[tokio::test]
async fn draw_above_percentage_sends_nothing() {
    let client = Arc::new(RecordingClient::default());
    let d = dispatcher(Some(shadow_config(50, &["a.internal"])), client.clone(), 51);
    let (snap, meta) = snapshot("GET", None, raw(""));

    let outcome = d.try_dispatch(&snap, &meta).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::NotSampled);
    assert!(client.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn sampled_request_reaches_every_host_once() {
    let client = Arc::new(RecordingClient::default());
    let d = dispatcher(
        Some(shadow_config(50, &["a.internal", "b.internal", "http://c.internal:8080"])),
        client.clone(),
        30,
    );
    let (snap, meta) = snapshot("POST", Some("q=ab%20cd"), raw(r#"{"id":1}"#));

    let outcome = d.try_dispatch(&snap, &meta).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Sent { calls: 3, failed: 0 });
    let sent = client.sent.lock().unwrap();
    let mut urls: Vec<_> = sent.iter().map(|r| r.url.to_string()).collect();
    urls.sort();
    assert_eq!(
        urls,
        vec![
            "http://c.internal:8080/hotels?q=ab%20cd",
            "https://a.internal/hotels?q=ab%20cd",
            "https://b.internal/hotels?q=ab%20cd",
        ]
    );
    for request in sent.iter() {
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body.as_deref(), Some(r#"{"id":1}"#));
        assert_eq!(request.headers.get("is-shadow-traffic").unwrap(), "true");
        assert_eq!(request.headers.get("shadow-traffic-from").unwrap(), "test-box");
    }
}

#[tokio::test]
async fn failing_host_does_not_stop_the_others() {
    let client = Arc::new(RecordingClient {
        failing_hosts: HashSet::from(["a.internal".to_string()]),
        ..RecordingClient::default()
    });
    let d = dispatcher(
        Some(shadow_config(100, &["a.internal", "b.internal"])),
        client.clone(),
        100,
    );
    let (snap, meta) = snapshot("GET", None, raw(""));

    let outcome = d.try_dispatch(&snap, &meta).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Sent { calls: 2, failed: 1 });
    assert_eq!(client.sent.lock().unwrap().len(), 2);
    let stats = d.stats().snapshot();
    assert_eq!(stats.shadow_calls_sent, 1);
    assert_eq!(stats.shadow_calls_failed, 1);
}

#[tokio::test]
async fn blank_and_invalid_hosts_are_skipped() {
    let client = Arc::new(RecordingClient::default());
    let d = dispatcher(
        Some(shadow_config(100, &["  ", "bad host[", "ok.internal"])),
        client.clone(),
        1,
    );
    let (snap, meta) = snapshot("GET", None, raw(""));

    let outcome = d.try_dispatch(&snap, &meta).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Sent { calls: 1, failed: 0 });
    let sent = client.sent.lock().unwrap();
    assert_eq!(sent[0].url.host_str(), Some("ok.internal"));
}

#[tokio::test]
async fn form_requests_carry_query_in_body() {
    let client = Arc::new(RecordingClient::default());
    let d = dispatcher(Some(shadow_config(100, &["a.internal"])), client.clone(), 1);
    let params = vec![
        ("source".to_string(), vec!["web".to_string()]),
        ("name".to_string(), vec!["ada".to_string(), "grace".to_string()]),
    ];
    let (snap, meta) = snapshot("POST", Some("source=web"), CapturedBody::FormEncoded(params));

    d.try_dispatch(&snap, &meta).await.unwrap();

    let sent = client.sent.lock().unwrap();
    assert_eq!(sent[0].url.as_str(), "https://a.internal/hotels");
    assert_eq!(sent[0].body.as_deref(), Some("source=web&name=ada"));
}

#[tokio::test]
async fn unresolvable_method_is_an_error() {
    let client = Arc::new(RecordingClient::default());
    let d = dispatcher(Some(shadow_config(100, &["a.internal"])), client.clone(), 1);
    let (snap, meta) = snapshot("PURGE", None, raw(""));

    let err = d.try_dispatch(&snap, &meta).await.unwrap_err();

    assert!(matches!(err, DispatchError::UnresolvableMethod { .. }));
    assert!(client.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_config_and_empty_hosts_are_errors() {
    let client = Arc::new(RecordingClient::default());
    let (snap, meta) = snapshot("GET", None, raw(""));

    let d = dispatcher(None, client.clone(), 1);
    assert!(matches!(
        d.try_dispatch(&snap, &meta).await.unwrap_err(),
        DispatchError::NoConfig
    ));

    let d = dispatcher(Some(shadow_config(100, &[])), client.clone(), 1);
    assert!(matches!(
        d.try_dispatch(&snap, &meta).await.unwrap_err(),
        DispatchError::NoHosts
    ));
}

#[tokio::test]
async fn dispatch_never_fails_outward() {
    let client = Arc::new(RecordingClient::default());
    let d = dispatcher(None, client, 1);
    let (snap, meta) = snapshot("GET", None, raw(""));

    // Logs and returns; there is nothing to propagate.
    d.dispatch(snap, meta).await;
}

#[tokio::test]
async fn submit_returns_before_shadow_calls_finish() {
    let client = Arc::new(RecordingClient::default());
    let d = Arc::new(dispatcher(
        Some(shadow_config(100, &["a.internal"])),
        client.clone(),
        1,
    ));
    let (snap, meta) = snapshot("GET", None, raw(""));

    d.submit(snap, meta);
    assert_eq!(d.stats().snapshot().dispatches_submitted, 1);

    for _ in 0..50 {
        if !client.sent.lock().unwrap().is_empty() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("dispatch never reached the client");
}
