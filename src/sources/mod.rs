//! Collaborator seams: HTTP transport and key-value persistence.

mod file;
#[cfg(feature = "http")]
mod remote;
mod store;
mod transport;

pub use file::FileStore;
#[cfg(feature = "http")]
pub use remote::{ReqwestTransport, ReqwestTransportBuilder};
pub use store::{MemoryStore, PreferenceStore};
pub use transport::{HttpAuth, HttpTransport, TransportRequest, TransportResponse};
