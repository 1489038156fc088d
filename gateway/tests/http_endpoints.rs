//! Integration tests for the HTTP candle source and notifier

use serde_json::json;
use sg_gateway::market::{BinanceCandleSource, CandleSource};
use sg_gateway::{
    DispatchError, FetchError, HttpNotifier, MarketDataConfig, Notifier, NotifyConfig,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn klines(closes: &[&str]) -> serde_json::Value {
    json!(closes
        .iter()
        .enumerate()
        .map(|(i, close)| json!([i as i64 * 300_000, "1.0", "2.0", "0.5", close, "100.0"]))
        .collect::<Vec<_>>())
}

fn market_config(server: &MockServer) -> MarketDataConfig {
    MarketDataConfig {
        base_url: server.uri(),
        timeout_sec: 2,
        ..MarketDataConfig::default()
    }
}

#[tokio::test]
async fn test_fetch_returns_closes_oldest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("interval", "5m"))
        .and(query_param("limit", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(klines(&["10.5", "11", "12.25"])))
        .expect(1)
        .mount(&server)
        .await;

    let source = BinanceCandleSource::new(&market_config(&server)).unwrap();
    let series = source.fetch("BTCUSDT", "5m", 3).await.unwrap();

    assert_eq!(series.closes(), &[10.5, 11.0, 12.25]);
    assert_eq!(series.last(), Some(12.25));
}

#[tokio::test]
async fn test_short_series_is_incomplete() {
    let server = MockServer::start().await;
    let closes: Vec<String> = (0..9).map(|i| format!("{}.0", 100 + i)).collect();
    let closes: Vec<&str> = closes.iter().map(String::as_str).collect();
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(klines(&closes)))
        .mount(&server)
        .await;

    let source = BinanceCandleSource::new(&market_config(&server)).unwrap();
    let err = source.fetch("BTCUSDT", "5m", 10).await.unwrap_err();

    assert!(matches!(err, FetchError::Incomplete { expected: 10, actual: 9 }));
}

#[tokio::test]
async fn test_error_status_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"code": -1121, "msg": "Invalid symbol."})))
        .mount(&server)
        .await;

    let source = BinanceCandleSource::new(&market_config(&server)).unwrap();
    let err = source.fetch("NOPE", "5m", 10).await.unwrap_err();

    match err {
        FetchError::Unreachable(message) => assert!(message.contains("400")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let source = BinanceCandleSource::new(&market_config(&server)).unwrap();
    let err = source.fetch("BTCUSDT", "5m", 1).await.unwrap_err();
    assert!(matches!(err, FetchError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(klines(&["1.0"]))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = MarketDataConfig {
        timeout_sec: 1,
        ..market_config(&server)
    };
    let source = BinanceCandleSource::new(&config).unwrap();
    let err = source.fetch("BTCUSDT", "5m", 1).await.unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)));
}

fn notify_config(server: &MockServer) -> NotifyConfig {
    NotifyConfig {
        endpoint: format!("{}/api/notify", server.uri()),
        timeout_sec: 2,
        ..NotifyConfig::default()
    }
}

#[tokio::test]
async fn test_notify_posts_form_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notify"))
        .and(header("authorization", "Bearer line-token"))
        .and(body_string_contains("message=EMA+Short%2FBTCUSDT+%285m%29"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200, "message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = HttpNotifier::new(&notify_config(&server), "line-token").unwrap();
    notifier.notify("EMA Short/BTCUSDT (5m)").await.unwrap();
}

#[tokio::test]
async fn test_notify_rejection_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid access token"))
        .mount(&server)
        .await;

    let notifier = HttpNotifier::new(&notify_config(&server), "stale").unwrap();
    let err = notifier.notify("CDC Long/ETHUSDT (1h)").await.unwrap_err();

    match err {
        DispatchError::NotifyFailed { status, message } => {
            assert_eq!(status, Some(401));
            assert_eq!(message, "Invalid access token");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
