//! # Tandem Registry
//!
//! Service registration and discovery collaborator interfaces.
//!
//! - [`ServiceInstance`]: id, name, version, metadata and endpoint URIs
//! - [`Endpoint`]: parsed `scheme://host:port?flags` URI
//! - [`Registrar`], [`Discovery`], [`Watcher`]: backend-neutral traits
//! - [`MemoryRegistry`]: in-process implementation of all three

mod endpoint;
mod error;
mod instance;
mod memory;
mod registry;

pub use endpoint::{Endpoint, SECURE_KEY};
pub use error::RegistryError;
pub use instance::ServiceInstance;
pub use memory::MemoryRegistry;
pub use registry::{Discovery, Registrar, Watcher};
