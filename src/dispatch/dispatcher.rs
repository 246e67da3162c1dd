use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::Error;
use crate::loading::LoadingSignal;
use crate::refresh::{Expired, PendingCall, RefreshCoordinator, Settled};
use crate::telemetry::refresh::AbortReason;
use crate::token::{Credential, FileTokenStore, MemoryTokenStore, TokenStore};
use crate::transport::{
    ReqwestTransport, Transport, TransportRequest, default_headers, send_tracked,
};
use crate::types::{RequestDescriptor, Response};

use super::{DispatchOutcome, StatusClass, StatusClassifier};

/// Authenticated request entry point.
///
/// Cheap to clone; every clone shares the same credential, queue and loading signal.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    loading: Arc<LoadingSignal>,
    classifier: StatusClassifier,
    coordinator: RefreshCoordinator,
}

impl Dispatcher {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let loading = LoadingSignal::new();
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::clone(&loading),
            config.refresh_url(),
            config.token_field.clone(),
            config.timeout(),
        );
        let classifier =
            StatusClassifier::new(config.auth_expired_status, config.unauthorized_status);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                transport,
                store,
                loading,
                classifier,
                coordinator,
            }),
        })
    }

    /// Builds the production stack: `reqwest` transport plus a file-backed store when
    /// `token_path` is set, an in-memory one otherwise.
    pub fn from_config(config: Config) -> Result<Self, Error> {
        let store: Arc<dyn TokenStore> = match &config.token_path {
            Some(path) => Arc::new(FileTokenStore::open(path, config.credential_key.clone())?),
            None => Arc::new(MemoryTokenStore::new()),
        };
        Self::new(config, Arc::new(ReqwestTransport::new()), store)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn credential(&self) -> Option<Credential> {
        self.inner.store.get()
    }

    /// Busy while any call, refresh or replay is outstanding.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.inner.loading.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.loading.is_busy()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.inner.coordinator
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.coordinator.is_refreshing()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.coordinator.queue_len()
    }

    pub async fn get(&self, endpoint: impl Into<String>) -> Result<Response, Error> {
        self.execute(RequestDescriptor::get(endpoint)).await
    }

    pub async fn post(
        &self,
        endpoint: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<Response, Error> {
        self.execute(RequestDescriptor::post(endpoint).with_body(body)).await
    }

    pub async fn put(
        &self,
        endpoint: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<Response, Error> {
        self.execute(RequestDescriptor::put(endpoint).with_body(body)).await
    }

    pub async fn patch(
        &self,
        endpoint: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<Response, Error> {
        self.execute(RequestDescriptor::patch(endpoint).with_body(body)).await
    }

    pub async fn delete(&self, endpoint: impl Into<String>) -> Result<Response, Error> {
        self.execute(RequestDescriptor::delete(endpoint)).await
    }

    /// Sends `descriptor` with the current credential.
    ///
    /// Settles exactly once. Calls that observe an expired credential are parked
    /// until the single in-flight refresh completes, then replayed with the new
    /// credential or rejected with `Error::Aborted`.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<Response, Error> {
        descriptor.validate()?;
        let _busy = self.inner.loading.begin();
        let start = Instant::now();
        let method = descriptor.method();
        let endpoint = descriptor.endpoint().to_string();

        let (result, cycles) = self.dispatch(descriptor, 0).await;

        DispatchOutcome::new(method, endpoint, &result, cycles, start.elapsed()).log();
        result
    }

    fn dispatch(&self, descriptor: RequestDescriptor, cycles: u8) -> BoxFuture<'static, Settled> {
        let this = self.clone();
        async move { this.dispatch_once(descriptor, cycles).await }.boxed()
    }

    async fn dispatch_once(&self, descriptor: RequestDescriptor, cycles: u8) -> Settled {
        let coordinator = &self.inner.coordinator;
        let (call, reply) = PendingCall::new(descriptor, cycles);
        let call = match coordinator.enqueue_if_refreshing(call) {
            Ok(()) => {
                debug!(queued = coordinator.queue_len(), "dispatch.queued");
                return settle(reply, cycles).await;
            }
            Err(call) => call,
        };

        let credential = self.inner.store.get();
        let request = self.build_request(call.descriptor(), credential.as_ref());
        debug!(
            method = %request.method,
            url = %request.url,
            cycles,
            "dispatch.send"
        );
        let sent = send_tracked(self.inner.transport.as_ref(), &self.inner.loading, request).await;
        let resp = match sent {
            Ok(resp) => resp,
            Err(err) => return (Err(err), cycles),
        };

        match self.inner.classifier.classify(resp.status) {
            StatusClass::Normal => (Ok(resp), cycles),
            StatusClass::Unauthorized => {
                warn!(
                    "credential rejected: status={} endpoint='{}'",
                    resp.status,
                    call.descriptor().endpoint()
                );
                (Err(Error::Unauthorized(resp.status, resp.body)), cycles)
            }
            StatusClass::ServerError => {
                coordinator.abort_all(AbortReason::ServerError);
                (Err(Error::Server(resp.status, resp.body)), cycles)
            }
            StatusClass::AuthExpired => {
                if cycles >= self.inner.config.max_refresh_cycles {
                    warn!(
                        "credential still expired after {} refresh cycle(s): endpoint='{}'",
                        cycles,
                        call.descriptor().endpoint()
                    );
                    return (Err(Error::RefreshLoop(cycles)), cycles);
                }
                let sent_with = credential.as_ref().map(Credential::value);
                match coordinator.handle_expired(call, sent_with) {
                    Expired::Leader => {
                        self.spawn_refresh();
                        settle(reply, cycles).await
                    }
                    Expired::Queued => settle(reply, cycles).await,
                    Expired::Stale(call) => {
                        debug!("credential already replaced; resending without refresh");
                        drop(reply);
                        self.dispatch(call.into_descriptor(), cycles + 1).await
                    }
                }
            }
        }
    }

    /// The refresh runs detached so it settles the queue even if the caller that
    /// started it is dropped.
    fn spawn_refresh(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            let replayer = this.clone();
            this.inner
                .coordinator
                .refresh(move |call| replayer.replay(call))
                .await;
        });
    }

    fn replay(&self, call: PendingCall) -> BoxFuture<'static, ()> {
        let resend = self.dispatch(call.descriptor().clone(), call.cycles() + 1);
        async move {
            let (result, cycles) = resend.await;
            call.resolve(result, cycles);
        }
        .boxed()
    }

    fn build_request(
        &self,
        descriptor: &RequestDescriptor,
        credential: Option<&Credential>,
    ) -> TransportRequest {
        TransportRequest {
            method: descriptor.method(),
            url: self.inner.config.resolve(descriptor.endpoint()),
            headers: default_headers(credential),
            body: descriptor.body().cloned(),
            query: descriptor.query().to_vec(),
            timeout: self.inner.config.timeout(),
        }
    }
}

/// A dropped sender means the call was discarded without settlement.
async fn settle(reply: tokio::sync::oneshot::Receiver<Settled>, cycles: u8) -> Settled {
    reply.await.unwrap_or((Err(Error::Aborted), cycles))
}
