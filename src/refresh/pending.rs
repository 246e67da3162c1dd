use tokio::sync::oneshot;
use tracing::debug;

use crate::errors::Error;
use crate::types::{RequestDescriptor, Response};

/// A settled result and the refresh cycles it took to get there.
pub(crate) type Settled = (Result<Response, Error>, u8);

pub(crate) type Reply = oneshot::Receiver<Settled>;

/// A request parked until the in-flight refresh settles.
///
/// Consumed exactly once, by `resolve` or `abort`.
#[derive(Debug)]
pub struct PendingCall {
    descriptor: RequestDescriptor,
    cycles: u8,
    reply: oneshot::Sender<Settled>,
}

impl PendingCall {
    pub(crate) fn new(descriptor: RequestDescriptor, cycles: u8) -> (Self, Reply) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                descriptor,
                cycles,
                reply,
            },
            rx,
        )
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    /// Refresh cycles this call has already gone through.
    pub fn cycles(&self) -> u8 {
        self.cycles
    }

    pub(crate) fn into_descriptor(self) -> RequestDescriptor {
        self.descriptor
    }

    pub(crate) fn resolve(self, result: Result<Response, Error>, cycles: u8) {
        if self.reply.send((result, cycles)).is_err() {
            debug!(
                "caller went away before settlement: {} {}",
                self.descriptor.method(),
                self.descriptor.endpoint()
            );
        }
    }

    pub(crate) fn abort(self) {
        let cycles = self.cycles;
        self.resolve(Err(Error::Aborted), cycles);
    }
}
