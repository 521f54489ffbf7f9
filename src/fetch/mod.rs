//! Resilient retrieval of remote playlists and guides
//!
//! The fetcher is built on three injectable seams so its retry policy can be
//! exercised without a network or a wall clock:
//!
//! - [`HttpTransport`]: one GET, whole body
//! - [`Sleeper`]: backoff delays
//! - [`AffinityStore`]: last working proxy per URL

pub mod affinity;
pub mod resilient;
pub mod sleeper;
pub mod transport;

pub use affinity::{AffinityStore, InMemoryAffinityStore};
pub use resilient::{FetchOptions, ResilientFetcher};
pub use sleeper::{Sleeper, TokioSleeper};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};
