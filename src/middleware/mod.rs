pub mod cached_request;
pub mod timing;

pub use cached_request::{CachedRequestOptions, RequestMeta, ResponseCache};
