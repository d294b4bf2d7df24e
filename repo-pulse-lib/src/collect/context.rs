use super::github::MetricsApi;
use super::rate_limiter::RateLimiter;
use crate::store::Store;
use std::sync::Arc;

/// Collaborators shared by the collection components.
#[derive(Debug)]
pub struct Context<A> {
    pub api: A,
    pub store: Arc<dyn Store>,
    pub limiter: RateLimiter,
}

impl<A: MetricsApi> Context<A> {
    pub fn new(api: A, store: Arc<dyn Store>, limiter: RateLimiter) -> Arc<Self> {
        Arc::new(Self { api, store, limiter })
    }
}
