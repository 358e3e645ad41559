use std::sync::Arc;

use forum_auth::Authenticator;
use forum_gateway::registry::ConnectionRegistry;
use forum_store::SharedStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: SharedStore,
    pub auth: Authenticator,
    pub registry: ConnectionRegistry,
}
