mod credential;
mod store;

pub use credential::{Credential, CredentialSnapshot};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
