mod coordinator;
mod pending;

pub use coordinator::{Expired, RefreshCoordinator};
pub use pending::PendingCall;
pub(crate) use pending::Settled;
