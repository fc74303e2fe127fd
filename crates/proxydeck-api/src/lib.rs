// proxydeck-api: management API client, provider probe and proxy
// process supervisor, wired onto the proxydeck-core backend traits.

pub mod backend;
pub mod error;
pub mod management;
pub mod probe;
pub mod process;
pub mod transport;

pub use error::Error;
pub use management::{
    AuthFile, AuthState, AuthUrlHandler, DEFAULT_MANAGEMENT_KEY, KeyEndpoint,
    MANAGEMENT_KEY_HEADER, ManagementClient, OAuthStart,
};
pub use probe::ProviderProbe;
pub use process::{ProcessConfig, ProcessProxy};
pub use transport::TransportConfig;

use std::sync::Arc;

use proxydeck_core::{Backends, FilePicker};

/// Assemble the controller's collaborators from the HTTP-backed pieces.
/// The management client serves as broker, importer and store.
pub fn backends(
    client: ManagementClient,
    probe: ProviderProbe,
    proxy: ProcessProxy,
    picker: Arc<dyn FilePicker>,
) -> Backends {
    let client = Arc::new(client);
    Backends {
        proxy: Arc::new(proxy),
        broker: client.clone(),
        importer: client.clone(),
        store: client,
        tester: Arc::new(probe),
        picker,
    }
}
