pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod platform;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use api::ApiClient;
pub use catalog::{CatalogSource, TemplateCatalog};
pub use config::ClientConfig;
pub use error::{MemeError, Result};
pub use platform::{LocalPlatform, PlatformServices};
pub use session::{GenerationOutcome, GenerationPhase, GenerationSession, SessionSnapshot};
pub use transport::{GenerationRequest, RuntimePlatform, TransportKind, TransportSet};
