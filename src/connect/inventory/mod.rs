//! Device-management inventory lookups.
//!
//! - [`Inventory`]: one computer record per call
//! - [`JamfClient`]: Jamf Classic API implementation
//! - [`OnDemandJamf`]: builds the client on the first lookup
//! - [`acquire_credentials`]: one-time credential gathering before the client
//!   is built

mod credentials;
mod document;
mod jamf;
mod on_demand;
mod traits;

pub(crate) use credentials::env_password;
pub use credentials::{Credentials, SECRET_KEY, acquire_credentials};
pub use jamf::JamfClient;
pub use on_demand::OnDemandJamf;
pub use traits::Inventory;
