use std::sync::Arc;
use std::time::Duration;

use services::AppServices;

use super::config::Config;
use super::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices, config: Config) -> Self {
        let limiter = RateLimiter::new(
            config.rate_limit_max,
            Duration::from_secs(config.rate_limit_window_secs),
        );
        Self {
            services,
            config: Arc::new(config),
            limiter: Arc::new(limiter),
        }
    }
}
