use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::Error;
use crate::loading::LoadingSignal;
use crate::telemetry::refresh::{AbortReason, RefreshTelemetry, emit_abort};
use crate::token::{Credential, TokenStore};
use crate::transport::{Transport, TransportRequest, default_headers, send_tracked};
use crate::types::{Method, RequestDescriptor};

use super::PendingCall;

/// What happened to a call that observed an expired credential.
#[derive(Debug)]
pub enum Expired {
    /// The call was queued and started the refresh; the caller must run it.
    Leader,
    /// A refresh is already in flight; the call was queued behind it.
    Queued,
    /// The credential changed after the call was sent, so no refresh is needed.
    Stale(PendingCall),
}

#[derive(Debug, Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<PendingCall>,
}

/// Single-flight refresh state machine and the queue of parked calls.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    loading: Arc<LoadingSignal>,
    refresh_url: String,
    token_field: String,
    timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
        loading: Arc<LoadingSignal>,
        refresh_url: impl Into<String>,
        token_field: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            transport,
            store,
            loading,
            refresh_url: refresh_url.into(),
            token_field: token_field.into(),
            timeout,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.state.lock().refreshing
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Queued descriptors in replay order.
    pub fn queued(&self) -> Vec<RequestDescriptor> {
        self.state
            .lock()
            .queue
            .iter()
            .map(|call| call.descriptor().clone())
            .collect()
    }

    /// Parks `call` if a refresh is in flight, otherwise hands it back.
    pub(crate) fn enqueue_if_refreshing(&self, call: PendingCall) -> Result<(), PendingCall> {
        let mut state = self.state.lock();
        if state.refreshing {
            state.queue.push_back(call);
            Ok(())
        } else {
            Err(call)
        }
    }

    /// `sent_with` is the token the call carried when it was rejected.
    pub(crate) fn handle_expired(&self, call: PendingCall, sent_with: Option<&str>) -> Expired {
        let mut state = self.state.lock();
        if state.refreshing {
            state.queue.push_back(call);
            return Expired::Queued;
        }
        let current = self.store.get();
        if current.as_ref().map(Credential::value) != sent_with {
            return Expired::Stale(call);
        }
        state.refreshing = true;
        state.queue.push_back(call);
        Expired::Leader
    }

    /// Rejects and removes every queued call. The refreshing flag is left alone;
    /// an in-flight refresh still settles whatever queues after this.
    pub(crate) fn abort_all(&self, reason: AbortReason) -> usize {
        let calls: Vec<PendingCall> = self.state.lock().queue.drain(..).collect();
        let aborted = calls.len();
        for call in calls {
            call.abort();
        }
        emit_abort(reason, aborted);
        aborted
    }

    /// Runs the refresh started by an `Expired::Leader` and settles the queue.
    ///
    /// On success every queued call goes to `replay` in FIFO order; each replay is
    /// polled once in that order before any of them is polled again.
    pub(crate) async fn refresh<F, Fut>(&self, replay: F)
    where
        F: FnMut(PendingCall) -> Fut,
        Fut: Future<Output = ()>,
    {
        let telemetry = RefreshTelemetry::new(&self.refresh_url);
        telemetry.emit_start(self.queue_len());
        let start = Instant::now();

        let result = match self.request_credential().await {
            Ok(credential) => self.store.set(credential),
            Err(err) => Err(err),
        };

        let calls: Vec<PendingCall> = {
            let mut state = self.state.lock();
            state.refreshing = false;
            state.queue.drain(..).collect()
        };

        match result {
            Ok(()) => {
                telemetry.emit_success(calls.len(), start.elapsed());
                join_all(calls.into_iter().map(replay)).await;
            }
            Err(err) => {
                telemetry.emit_failure(&err, start.elapsed());
                let aborted = calls.len();
                for call in calls {
                    call.abort();
                }
                emit_abort(AbortReason::RefreshFailed, aborted);
            }
        }
    }

    async fn request_credential(&self) -> Result<Credential, Error> {
        let current = self.store.get();
        let request = TransportRequest {
            method: Method::Get,
            url: self.refresh_url.clone(),
            headers: default_headers(current.as_ref()),
            body: None,
            query: Vec::new(),
            timeout: self.timeout,
        };
        let resp = send_tracked(self.transport.as_ref(), &self.loading, request).await?;
        if !resp.is_success() {
            warn!(
                "refresh rejected: status={} body='{}'",
                resp.status, resp.body
            );
            return Err(if resp.status >= 500 {
                Error::Server(resp.status, resp.body)
            } else {
                Error::Unauthorized(resp.status, resp.body)
            });
        }
        let payload: serde_json::Value = resp.json()?;
        let credential = Credential::from_refresh_payload(&payload, &self.token_field)?;
        debug!("refreshed credential acquired (len={})", credential.value().len());
        Ok(credential)
    }
}
