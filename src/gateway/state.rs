use std::{num::NonZeroU32, sync::Arc};

use governor::{Quota, RateLimiter};

use crate::{
    Format,
    gateway::{routes::Limiter, service::GatewayService},
};

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GatewayService>,
    pub format: Format,
    pub rate_limiter: Option<Arc<Limiter>>,
}

impl AppState {
    pub fn new(service: GatewayService) -> Self {
        Self {
            service: Arc::new(service),
            format: Format::default(),
            rate_limiter: None,
        }
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Caps the whole gateway at `max_qps` requests per second. Zero leaves it unlimited.
    pub fn with_rate_limiter(mut self, max_qps: u32) -> Self {
        self.rate_limiter = NonZeroU32::new(max_qps)
            .map(|qps| Arc::new(RateLimiter::direct(Quota::per_second(qps))));
        self
    }
}
