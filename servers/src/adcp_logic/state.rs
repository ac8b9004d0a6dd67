use lib_adcp::core::hub::HubHandle;

/// Shared by every axum handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub hub: HubHandle,
}

impl AppState {
    pub fn new(hub: HubHandle) -> Self {
        Self { hub }
    }
}
