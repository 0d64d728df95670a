//! 积分服务 HTTP 客户端集成测试
//!
//! 在本地随机端口启动 axum 模拟服务，覆盖协议中的全部响应分支。

use std::net::SocketAddr;
use std::time::Duration;

use accrual_service::client::{AccrualClient, DEFAULT_RETRY_AFTER, HttpAccrualClient};
use accrual_service::error::AccrualError;
use accrual_service::models::{AccrualResponse, AccrualStatus};
use axum::extract::Path;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rust_decimal_macros::dec;

// ==================== 模拟服务 ====================

async fn order_handler(Path(number): Path<String>) -> Response {
    match number.as_str() {
        "12345678903" => Json(serde_json::json!({
            "order": number,
            "status": "PROCESSED",
            "accrual": 500
        }))
        .into_response(),
        "2377225624" => Json(serde_json::json!({
            "order": number,
            "status": "PROCESSED",
            "accrual": 729.98
        }))
        .into_response(),
        "79927398713" => Json(serde_json::json!({
            "order": number,
            "status": "INVALID"
        }))
        .into_response(),
        "18" => Json(serde_json::json!({
            "order": number,
            "status": "REGISTERED"
        }))
        .into_response(),
        "4561261212345467" => StatusCode::NO_CONTENT.into_response(),
        "26" => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "120")],
            "No more than 10 requests per minute allowed",
        )
            .into_response(),
        "34" => StatusCode::TOO_MANY_REQUESTS.into_response(),
        "42" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "59" => (StatusCode::OK, "not json").into_response(),
        "67" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            StatusCode::NO_CONTENT.into_response()
        }
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn spawn_mock_server() -> SocketAddr {
    let app = Router::new().route("/api/orders/{number}", get(order_handler));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn client_with_timeout(timeout: Duration) -> HttpAccrualClient {
    let addr = spawn_mock_server().await;
    HttpAccrualClient::new(format!("http://{addr}/"), timeout).unwrap()
}

async fn client() -> HttpAccrualClient {
    client_with_timeout(Duration::from_secs(2)).await
}

// ==================== 测试 ====================

#[tokio::test]
async fn test_processed_verdict() {
    let client = client().await;

    let response = client.fetch_accrual("12345678903").await.unwrap();
    let AccrualResponse::Verdict(verdict) = response else {
        panic!("expected verdict, got {response:?}");
    };
    assert_eq!(verdict.order, "12345678903");
    assert_eq!(verdict.status, AccrualStatus::Processed);
    assert_eq!(verdict.accrual, Some(dec!(500)));
}

#[tokio::test]
async fn test_fractional_accrual() {
    let client = client().await;

    let AccrualResponse::Verdict(verdict) = client.fetch_accrual("2377225624").await.unwrap()
    else {
        panic!("expected verdict");
    };
    assert_eq!(verdict.accrual_amount(), dec!(729.98));
}

#[tokio::test]
async fn test_non_final_and_invalid_verdicts() {
    let client = client().await;

    let AccrualResponse::Verdict(invalid) = client.fetch_accrual("79927398713").await.unwrap()
    else {
        panic!("expected verdict");
    };
    assert_eq!(invalid.status, AccrualStatus::Invalid);
    assert_eq!(invalid.accrual, None);

    let AccrualResponse::Verdict(registered) = client.fetch_accrual("18").await.unwrap() else {
        panic!("expected verdict");
    };
    assert_eq!(registered.status, AccrualStatus::Registered);
}

#[tokio::test]
async fn test_no_content_maps_to_unknown() {
    let client = client().await;

    let response = client.fetch_accrual("4561261212345467").await.unwrap();
    let AccrualResponse::Verdict(verdict) = response else {
        panic!("expected verdict");
    };
    assert_eq!(verdict.status, AccrualStatus::Unknown);
    assert_eq!(verdict.order, "4561261212345467");
}

#[tokio::test]
async fn test_too_many_requests_is_rate_limit_not_error() {
    let client = client().await;

    assert_eq!(
        client.fetch_accrual("26").await.unwrap(),
        AccrualResponse::RateLimited {
            retry_after: Duration::from_secs(120)
        }
    );

    // 缺少 Retry-After 时使用默认冷却
    assert_eq!(
        client.fetch_accrual("34").await.unwrap(),
        AccrualResponse::RateLimited {
            retry_after: DEFAULT_RETRY_AFTER
        }
    );
}

#[tokio::test]
async fn test_server_error_is_transport_failure() {
    let client = client().await;

    let err = client.fetch_accrual("42").await.unwrap_err();
    assert!(matches!(err, AccrualError::UnexpectedStatus { status: 500 }));
}

#[tokio::test]
async fn test_malformed_body_is_transport_failure() {
    let client = client().await;

    let err = client.fetch_accrual("59").await.unwrap_err();
    assert!(matches!(err, AccrualError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let client = client_with_timeout(Duration::from_millis(200)).await;

    let err = client.fetch_accrual("67").await.unwrap_err();
    assert!(matches!(err, AccrualError::Timeout { timeout_ms: 200 }));
    assert_eq!(err.outcome(), "timeout");
}

#[tokio::test]
async fn test_connection_refused_is_transport_failure() {
    // 绑定后立即释放端口，保证无人监听
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpAccrualClient::new(format!("http://{addr}"), Duration::from_secs(1)).unwrap();
    let err = client.fetch_accrual("12345678903").await.unwrap_err();
    assert!(matches!(err, AccrualError::Request(_)));
}
