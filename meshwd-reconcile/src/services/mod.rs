//! External service clients
//!
//! - [`WikidataClient`]: `wbsearchentities` candidate search, label fallback,
//!   sitelink (Wikipedia article) resolution
//! - [`SparqlClient`]: instance-of / subclass-of via the query service

pub mod sparql_client;
pub mod wikidata_client;

pub use sparql_client::SparqlClient;
pub use wikidata_client::WikidataClient;

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

/// Direct (unkeyed) token-bucket limiter shared by all requests of a client
pub(crate) type RequestLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

pub(crate) fn request_limiter(per_second: u32) -> RequestLimiter {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate))
}

/// Wikidata item ids are `Q` followed by digits
pub fn is_valid_qid(qid: &str) -> bool {
    let mut chars = qid.chars();
    chars.next() == Some('Q')
        && qid.len() > 1
        && chars.all(|c| c.is_ascii_digit())
}

/// Last path segment of an entity URI (`http://www.wikidata.org/entity/Q5` → `Q5`)
pub(crate) fn qid_from_uri(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}
