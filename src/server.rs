//! HTTP server: the messaging endpoint plus a health probe.

use crate::router::Bot;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Build the axum router for the bot.
pub fn app(bot: Arc<Bot>, message_path: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(message_path, post(messages))
        .with_state(bot)
}

/// Start the HTTP server on the given address.
///
/// The consent reclaimer runs for as long as the server does: once the
/// listener has drained after `shutdown_rx` flips to `true`, the reclaimer is
/// cancelled and joined before the returned task completes.
pub async fn start_http_server(
    bind: SocketAddr,
    bot: Arc<Bot>,
    message_path: &str,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind(bind).await?;
    tracing::info!(%bind, %message_path, "HTTP server listening");
    Ok(serve(listener, bot, message_path, shutdown_rx))
}

fn serve(
    listener: TcpListener,
    bot: Arc<Bot>,
    message_path: &str,
    shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let app = app(bot.clone(), message_path);
    let reclaim_token = CancellationToken::new();
    let reclaimer = bot
        .consents()
        .spawn_reclaimer(bot.transport().clone(), reclaim_token.clone());

    tokio::spawn(async move {
        let mut shutdown = shutdown_rx;
        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|v| *v).await;
            })
            .await
        {
            tracing::error!(%error, "HTTP server exited with error");
        }

        reclaim_token.cancel();
        reclaimer.join().await;
        tracing::info!("HTTP server stopped");
    })
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn messages(State(bot): State<Arc<Bot>>, headers: HeaderMap, body: Bytes) -> Response {
    let activity = match bot.transport().parse_request(&headers, &body) {
        Ok(activity) => activity,
        Err(error) => {
            tracing::warn!(%error, "rejecting inbound request");
            return (StatusCode::BAD_REQUEST, error.to_string()).into_response();
        }
    };

    match bot.handle_activity(&activity).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => {
            tracing::error!(
                %error,
                kind = %activity.kind,
                conversation_id = %activity.conversation.id,
                "failed to process activity"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{RecordingTransport, StaticExecutor, TransportCall};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;

    const PATH: &str = "/api/messages";

    fn bot(transport: &Arc<RecordingTransport>, executor: StaticExecutor) -> Arc<Bot> {
        Arc::new(
            Bot::new(&Config::default(), transport.clone(), Arc::new(executor))
                .expect("bot should build"),
        )
    }

    fn message_body(text: &str) -> String {
        json!({
            "type": "message",
            "id": "msg-1",
            "text": text,
            "serviceUrl": "https://smba.example.com/emea/",
            "channelId": "msteams",
            "conversation": { "id": "conv-1", "conversationType": "channel" }
        })
        .to_string()
    }

    fn post_request(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(PATH)
            .header("content-type", "application/json")
            .body(body.into())
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let transport = Arc::new(RecordingTransport::new());
        let response = app(bot(&transport, StaticExecutor::new("")), PATH)
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert_eq!(body.as_ref(), br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn handled_message_returns_ok() {
        let transport = Arc::new(RecordingTransport::new());
        let response = app(bot(&transport, StaticExecutor::new("pong")), PATH)
            .oneshot(post_request(message_body("ping")))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.replies().len(), 1);
    }

    #[tokio::test]
    async fn malformed_activity_is_a_bad_request() {
        let transport = Arc::new(RecordingTransport::new());
        let response = app(bot(&transport, StaticExecutor::new("")), PATH)
            .oneshot(post_request("{not json"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn processing_failure_is_a_server_error() {
        let transport = Arc::new(RecordingTransport::new());
        let response = app(bot(&transport, StaticExecutor::failing()), PATH)
            .oneshot(post_request(message_body("get pods")))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn declined_consent_prompt_is_deleted_in_background() {
        let transport = Arc::new(RecordingTransport::new());
        let bot = bot(&transport, StaticExecutor::new(""));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = serve(listener, bot.clone(), PATH, shutdown_rx);

        let invoke = json!({
            "type": "invoke",
            "name": "fileConsent/invoke",
            "id": "invoke-1",
            "replyToId": "consent-card-1",
            "serviceUrl": "https://smba.example.com/emea/",
            "conversation": { "id": "a:personal", "conversationType": "personal" },
            "value": { "type": "fileUpload", "action": "decline" }
        });
        let response = reqwest::Client::new()
            .post(format!("http://{addr}{PATH}"))
            .json(&invoke)
            .send()
            .await
            .expect("request should reach the server");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        transport.wait_for_deletions(1).await;
        assert_eq!(
            transport.calls(),
            vec![TransportCall::Delete {
                activity_id: "consent-card-1".into(),
                conversation_id: "a:personal".into(),
            }]
        );

        shutdown_tx.send(true).expect("server still running");
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server should stop")
            .expect("server task should not panic");
    }
}
