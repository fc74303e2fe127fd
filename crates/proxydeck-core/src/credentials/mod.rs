// ── Credential mirrors ──

mod store;
mod workspace;

pub use store::{CredentialStore, EditBuffer};
pub use workspace::{CredentialWorkspace, TestTarget};
