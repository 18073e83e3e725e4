use std::sync::Arc;

use crate::config::Config;
use crate::documents::service_client::DocumentServiceClient;
use crate::gateway::ModelGateway;
use crate::optimize::optimizer::Optimizer;
use crate::session::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Also held by `optimizer`; exposed directly for the settings endpoints.
    pub gateway: Arc<ModelGateway>,
    pub optimizer: Arc<Optimizer>,
    /// Redis when `REDIS_URL` is set, otherwise in-memory.
    pub sessions: Arc<dyn SessionStore>,
    pub documents: DocumentServiceClient,
}
