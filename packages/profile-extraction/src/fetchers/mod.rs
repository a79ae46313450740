//! Page fetcher implementations.
//!
//! - `HttpFetcher` - reqwest with politeness delay and timeout classification
//! - `MockFetcher` (in [`crate::testing`]) - canned pages for tests

mod http;

pub use http::HttpFetcher;

pub use crate::traits::fetcher::PageFetcher;
