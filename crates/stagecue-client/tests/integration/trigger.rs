//! Trigger tests -- one throwaway session per action.

use std::time::Duration;

use stagecue_client::{Action, ActionOutcome, ClientError, Trigger, WsConnector};

use crate::harness::{closed_port, response, StubServer};

fn trigger_for(server: &StubServer, secret: Option<&str>) -> Trigger {
    let mut params = server.params();
    params.secret = secret.map(String::from);
    Trigger::with_connector(params, Duration::from_secs(5), WsConnector)
}

#[tokio::test]
async fn test_fire_starts_and_closes() {
    let server = StubServer::standard(true, |req| response(req, true, None))
        .await
        .unwrap();

    let outcome = trigger_for(&server, Some("pw")).fire().await.unwrap();
    assert!(matches!(outcome, ActionOutcome::Started));

    server
        .wait_client_close(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(server.received()[1]["d"]["requestType"], "StartStream");

    server.shutdown();
}

/// Start refused by the server: error returned, connection still closed.
#[tokio::test]
async fn test_fire_closes_after_rejected_start() {
    let server = StubServer::standard(false, |req| response(req, false, None))
        .await
        .unwrap();

    let result = trigger_for(&server, None).fire().await;
    assert!(matches!(result, Err(ClientError::RequestFailed { .. })));

    server
        .wait_client_close(Duration::from_secs(5))
        .await
        .unwrap();

    server.shutdown();
}

#[tokio::test]
async fn test_each_run_uses_a_fresh_session() {
    let server = StubServer::standard(false, |req| response(req, true, None))
        .await
        .unwrap();
    let trigger = trigger_for(&server, None);

    assert!(matches!(
        trigger.run(Action::Start).await,
        Ok(ActionOutcome::Started)
    ));
    assert!(matches!(
        trigger.run(Action::Stop).await,
        Ok(ActionOutcome::Stopped)
    ));

    // Two Identify messages: one handshake per run.
    let identifies = server
        .received()
        .iter()
        .filter(|msg| msg["op"] == 1)
        .count();
    assert_eq!(identifies, 2);

    server.shutdown();
}

#[tokio::test]
async fn test_fire_unreachable() {
    let port = closed_port().await;
    let trigger = Trigger::with_connector(
        stagecue_client::ConnectionParams::new("127.0.0.1", port),
        Duration::from_secs(5),
        WsConnector,
    );
    assert!(trigger.fire().await.unwrap_err().is_transport());
}
