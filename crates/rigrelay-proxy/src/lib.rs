//! rigrelay-proxy: One caching proxy session per accepted client
//! connection.
//!
//! A [`Proxy`] reads framed requests from its downstream client, applies
//! the cache and invalidation policy, delegates misses to the shared
//! transceiver, and writes responses back in the format the client asked
//! for. Sessions are single-threaded after accept, so responses on one
//! connection are strictly in request order.

pub mod proxy;

pub use proxy::{NopCache, Proxy, RequestSender, ResponseCache};
