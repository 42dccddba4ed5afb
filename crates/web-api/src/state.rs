use std::sync::Arc;

use application::{Dispatcher, Relay, RelayPolicy};
use config::AppConfig;

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub dispatcher: Dispatcher,
    pub jwt_service: Arc<JwtService>,
    /// 每条连接出站队列的容量
    pub outbound_buffer: usize,
}

impl AppState {
    pub fn new(relay: Arc<Relay>, jwt_service: Arc<JwtService>, outbound_buffer: usize) -> Self {
        Self {
            dispatcher: Dispatcher::new(relay.clone()),
            relay,
            jwt_service,
            outbound_buffer,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let relay = Arc::new(Relay::new(RelayPolicy::from(&config.relay)));
        let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));
        Self::new(relay, jwt_service, config.relay.outbound_buffer)
    }
}
