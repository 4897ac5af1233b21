//! Test harness for in-process stagecue integration tests.
//!
//! Provides StubServer: a real WebSocket server on 127.0.0.1 that sends a
//! scripted Hello, records every text message it receives, and answers each
//! one through a responder closure.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use stagecue_client::ConnectionParams;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Token for secret "pw", salt "s1", challenge "c1".
pub const PW_TOKEN: &str = "pYd4sosyRsEuVWHjDq0+fEXiKzQ4q6ptBMaOhDbZP7M=";

/// What the stub does with one received message.
#[allow(dead_code)]
pub enum Reply {
    Text(Value),
    Close(u16),
    Silent,
}

type Responder = dyn Fn(&Value) -> Reply + Send + Sync;

pub struct StubServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
    client_closes: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

#[allow(dead_code)]
impl StubServer {
    /// Serve `hello` to every client, then answer with `responder`.
    pub async fn start<F>(hello: Value, responder: F) -> anyhow::Result<Self>
    where
        F: Fn(&Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let received = Arc::new(Mutex::new(Vec::new()));
        let client_closes = Arc::new(AtomicUsize::new(0));
        let responder: Arc<Responder> = Arc::new(responder);

        let handle = {
            let received = received.clone();
            let client_closes = client_closes.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let hello = hello.clone();
                    let responder = responder.clone();
                    let received = received.clone();
                    let client_closes = client_closes.clone();
                    tokio::spawn(async move {
                        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                            return;
                        };
                        if ws.send(Message::Text(hello.to_string())).await.is_err() {
                            return;
                        }
                        while let Some(Ok(msg)) = ws.next().await {
                            match msg {
                                Message::Text(text) => {
                                    let Ok(value) = serde_json::from_str::<Value>(&text) else {
                                        continue;
                                    };
                                    received.lock().unwrap().push(value.clone());
                                    match responder(&value) {
                                        Reply::Text(reply) => {
                                            let _ = ws.send(Message::Text(reply.to_string())).await;
                                        }
                                        Reply::Close(code) => {
                                            let frame = CloseFrame {
                                                code: CloseCode::from(code),
                                                reason: "closed by stub".into(),
                                            };
                                            let _ = ws.close(Some(frame)).await;
                                        }
                                        Reply::Silent => {}
                                    }
                                }
                                Message::Close(_) => {
                                    client_closes.fetch_add(1, Ordering::SeqCst);
                                }
                                _ => {}
                            }
                        }
                    });
                }
            })
        };

        Ok(Self {
            addr,
            received,
            client_closes,
            handle,
        })
    }

    /// Stub that speaks the usual protocol: Hello (with a pw/s1/c1
    /// challenge when `auth`), Identified for the right token or close 4009
    /// for a wrong one, and `on_request` for every request.
    pub async fn standard<F>(auth: bool, on_request: F) -> anyhow::Result<Self>
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let hello = if auth {
            json!({
                "op": 0,
                "d": {
                    "obsWebSocketVersion": "5.0.0",
                    "rpcVersion": 1,
                    "authentication": { "challenge": "c1", "salt": "s1" }
                }
            })
        } else {
            json!({ "op": 0, "d": { "obsWebSocketVersion": "5.0.0", "rpcVersion": 1 } })
        };

        Self::start(hello, move |msg| match msg["op"].as_u64() {
            Some(1) => {
                if auth && msg["d"]["authentication"] != PW_TOKEN {
                    Reply::Close(4009)
                } else {
                    Reply::Text(json!({ "op": 2, "d": { "negotiatedRpcVersion": 1 } }))
                }
            }
            Some(6) => Reply::Text(on_request(&msg["d"])),
            _ => Reply::Silent,
        })
        .await
    }

    pub fn params(&self) -> ConnectionParams {
        ConnectionParams::new("127.0.0.1", self.addr.port())
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Poll until the client has sent a close frame, or timeout.
    pub async fn wait_client_close(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.client_closes.load(Ordering::SeqCst) > 0 {
                return Ok(());
            }
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("timeout waiting for the client to close");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

/// RequestResponse echoing `request`'s type and id.
pub fn response(request: &Value, result: bool, data: Option<Value>) -> Value {
    let code = if result { 100 } else { 500 };
    let mut d = json!({
        "requestType": request["requestType"],
        "requestId": request["requestId"],
        "requestStatus": { "result": result, "code": code }
    });
    if !result {
        d["requestStatus"]["comment"] = json!("Streaming is already active.");
    }
    if let Some(data) = data {
        d["responseData"] = data;
    }
    json!({ "op": 7, "d": d })
}

/// A port nothing is listening on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
