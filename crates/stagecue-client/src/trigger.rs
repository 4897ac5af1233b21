//! Trigger invoker -- one fresh session per action.
//!
//! connect -> action -> disconnect. The disconnect runs on every exit path:
//! success, handshake failure, command failure, or shutdown.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::config::ClientConfig;
use crate::recurring::{RecurringScheduler, Ticker};
use crate::schedule::parse_clock_time;
use crate::session::{Session, StreamStatus};
use crate::transport::{Connector, WsConnector};
use crate::{ClientError, ConnectionParams};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Status,
    Schedule {
        time: String,
        duration_minutes: Option<u64>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::Status => "status",
            Action::Schedule { .. } => "schedule",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ActionOutcome {
    Started,
    Stopped,
    Status(StreamStatus),
    Scheduled {
        target: DateTime<Local>,
        stopped_after: Option<Duration>,
    },
}

#[derive(Debug, Clone)]
pub struct Trigger<C: Connector + Clone = WsConnector> {
    params: ConnectionParams,
    request_timeout: Duration,
    connector: C,
}

impl Trigger<WsConnector> {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_connector(config.connection_params(), config.request_timeout(), WsConnector)
    }
}

impl<C: Connector + Clone> Trigger<C> {
    pub fn with_connector(params: ConnectionParams, request_timeout: Duration, connector: C) -> Self {
        Self {
            params,
            request_timeout,
            connector,
        }
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Start streaming in a throwaway session.
    pub async fn fire(&self) -> Result<ActionOutcome, ClientError> {
        self.fire_until(std::future::pending()).await
    }

    /// `fire()`, abandoned (but still disconnected) if `shutdown` completes
    /// first. This is what the weekly scheduler binds each entry to.
    pub async fn fire_until<F>(&self, shutdown: F) -> Result<ActionOutcome, ClientError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(host = %self.params.host, port = self.params.port, "trigger fired");
        self.run_until(Action::Start, shutdown).await
    }

    pub async fn run(&self, action: Action) -> Result<ActionOutcome, ClientError> {
        self.run_until(action, std::future::pending()).await
    }

    /// Run `action`, abandoning it (but still disconnecting) if `shutdown`
    /// completes first.
    pub async fn run_until<F>(&self, action: Action, shutdown: F) -> Result<ActionOutcome, ClientError>
    where
        F: Future<Output = ()>,
    {
        let mut session = Session::with_connector(self.params.clone(), self.connector.clone())
            .with_request_timeout(self.request_timeout);

        let name = action.name();
        let result = tokio::select! {
            result = perform(&mut session, action) => result,
            () = shutdown => {
                tracing::info!(action = name, "shutdown requested, abandoning action");
                Err(ClientError::Cancelled)
            }
        };

        session.disconnect().await;
        result
    }
}

impl<C> Trigger<C>
where
    C: Connector + Clone + 'static,
    C::Transport: 'static,
{
    /// Drive `scheduler` until `shutdown` is sent, firing one session per due
    /// entry. On shutdown every in-flight session is cancelled and
    /// disconnected; any still running after `grace` is aborted.
    pub async fn serve<Tz, T, N>(
        self: Arc<Self>,
        scheduler: RecurringScheduler<Tz>,
        ticker: T,
        clock: N,
        shutdown: &broadcast::Sender<()>,
        grace: Duration,
    ) where
        Tz: TimeZone,
        T: Ticker,
        N: Fn() -> DateTime<Tz>,
    {
        let mut in_flight = JoinSet::new();

        scheduler
            .run(
                ticker,
                clock,
                |entry| {
                    let trigger = self.clone();
                    let mut cancel = shutdown.subscribe();
                    in_flight.spawn(async move {
                        let cancelled = async move {
                            let _ = cancel.recv().await;
                        };
                        match trigger.fire_until(cancelled).await {
                            Ok(_) => tracing::info!(entry = %entry, "scheduled stream started"),
                            Err(e) => {
                                tracing::warn!(entry = %entry, error = %e, "scheduled stream failed")
                            }
                        }
                    });
                },
                shutdown.subscribe(),
            )
            .await;

        let drain = async {
            while let Some(joined) = in_flight.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(error = %e, "scheduled session task failed");
                }
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!(
                remaining = in_flight.len(),
                "aborting sessions still running after shutdown"
            );
            in_flight.abort_all();
        }
    }
}

/// Shutdown future over an OS signal. If the signal handler could not be
/// installed this never completes, so the action runs to its end instead of
/// being cancelled at once.
pub async fn signal_or_pending<F, E>(signal: F)
where
    F: Future<Output = Result<(), E>>,
    E: fmt::Display,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn perform<C: Connector>(
    session: &mut Session<C>,
    action: Action,
) -> Result<ActionOutcome, ClientError> {
    // A bad time never costs a connection.
    if let Action::Schedule { time, .. } = &action {
        parse_clock_time(time)?;
    }

    if !session.connect().await? {
        return Err(session
            .take_failure()
            .unwrap_or_else(|| ClientError::AuthRejected("handshake failed".into())));
    }

    match action {
        Action::Start => {
            session.start_streaming().await?;
            Ok(ActionOutcome::Started)
        }
        Action::Stop => {
            session.stop_streaming().await?;
            Ok(ActionOutcome::Stopped)
        }
        Action::Status => Ok(ActionOutcome::Status(session.stream_status().await?)),
        Action::Schedule {
            time,
            duration_minutes,
        } => {
            let plan = session.schedule_stream(&time, duration_minutes).await?;
            Ok(ActionOutcome::Scheduled {
                target: plan.target,
                stopped_after: plan.stop_after,
            })
        }
    }
}
