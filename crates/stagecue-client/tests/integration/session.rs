//! Session tests -- handshake and commands against a live stub server.

use serde_json::json;
use stagecue_client::{ClientError, ConnectionParams, Session, SessionState};

use crate::harness::{closed_port, response, StubServer, PW_TOKEN};

/// Full exchange with authentication: Hello, Identify with the right token,
/// Identified, then StartStream.
#[tokio::test]
async fn test_authenticated_start() {
    let server = StubServer::standard(true, |req| response(req, true, None))
        .await
        .unwrap();

    let mut session = Session::new(server.params().with_secret("pw"));
    assert!(session.connect().await.unwrap());
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.negotiated_rpc_version(), Some(1));

    session.start_streaming().await.unwrap();
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Closed);

    let received = server.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["op"], 1);
    assert_eq!(received[0]["d"]["rpcVersion"], 1);
    assert_eq!(received[0]["d"]["authentication"], PW_TOKEN);
    assert_eq!(received[0]["d"]["eventSubscriptions"], 0);
    assert_eq!(received[1]["op"], 6);
    assert_eq!(received[1]["d"]["requestType"], "StartStream");
    assert_eq!(received[1]["d"]["requestId"], "start-stream");

    server.shutdown();
}

/// No challenge in Hello: Identify carries no authentication field.
#[tokio::test]
async fn test_open_server_needs_no_secret() {
    let server = StubServer::standard(false, |req| response(req, true, None))
        .await
        .unwrap();

    let mut session = Session::new(server.params());
    assert!(session.connect().await.unwrap());
    session.stop_streaming().await.unwrap();
    session.disconnect().await;

    let received = server.received();
    assert!(received[0]["d"].get("authentication").is_none());
    assert_eq!(received[1]["d"]["requestType"], "StopStream");

    server.shutdown();
}

#[tokio::test]
async fn test_status_is_parsed() {
    let server = StubServer::standard(false, |req| {
        response(
            req,
            true,
            Some(json!({
                "outputActive": true,
                "outputReconnecting": false,
                "outputTimecode": "00:01:05.000",
                "outputDuration": 65000,
                "outputCongestion": 0.0,
                "outputBytes": 1048576,
                "outputSkippedFrames": 0,
                "outputTotalFrames": 3900
            })),
        )
    })
    .await
    .unwrap();

    let mut session = Session::new(server.params());
    assert!(session.connect().await.unwrap());
    let status = session.stream_status().await.unwrap();
    session.disconnect().await;

    assert!(status.active);
    assert_eq!(status.duration_ms, 65000);
    assert_eq!(status.bytes_sent, 1048576);
    assert_eq!(status.timecode, "00:01:05.000");
    assert_eq!(server.received()[1]["d"]["requestId"], "get-stream-status");

    server.shutdown();
}

/// Server closes with 4009: reached, but rejected.
#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let server = StubServer::standard(true, |req| response(req, true, None))
        .await
        .unwrap();

    let mut session = Session::new(server.params().with_secret("not-the-password"));
    assert!(!session.connect().await.unwrap());
    assert_eq!(session.state(), SessionState::Failed);
    assert!(matches!(
        session.failure(),
        Some(ClientError::AuthRejected(_))
    ));

    // No command goes out on a failed session.
    assert!(matches!(
        session.start_streaming().await,
        Err(ClientError::InvalidState { .. })
    ));
    assert_eq!(server.received().len(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_missing_password_is_auth_required() {
    let server = StubServer::standard(true, |req| response(req, true, None))
        .await
        .unwrap();

    let mut session = Session::new(server.params());
    assert!(!session.connect().await.unwrap());
    assert!(matches!(session.failure(), Some(ClientError::AuthRequired)));
    assert!(server.received().is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_rejected_request_carries_comment() {
    let server = StubServer::standard(false, |req| response(req, false, None))
        .await
        .unwrap();

    let mut session = Session::new(server.params());
    assert!(session.connect().await.unwrap());
    match session.start_streaming().await {
        Err(ClientError::RequestFailed {
            request_type,
            code,
            comment,
        }) => {
            assert_eq!(request_type, "StartStream");
            assert_eq!(code, Some(500));
            assert_eq!(comment.as_deref(), Some("Streaming is already active."));
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
    // A rejected request leaves the session usable.
    assert_eq!(session.state(), SessionState::Ready);
    session.disconnect().await;

    server.shutdown();
}

/// Nothing listening: a transport error, not a handshake failure.
#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let port = closed_port().await;
    let mut session = Session::new(ConnectionParams::new("127.0.0.1", port));
    let err = session.connect().await.unwrap_err();
    assert!(err.is_transport(), "expected transport error, got {err}");
    assert_eq!(session.state(), SessionState::Failed);
}
