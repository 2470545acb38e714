pub mod authenticator;
pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod escalation;
pub mod pipeline;
pub mod refresh;
pub mod session;
pub mod startup;
pub mod transport;

pub use credentials::{CredentialProvider, Credentials};
pub use error::PipelineError;
pub use escalation::{BroadcastNavigator, NavigationEvent, Navigator};
pub use pipeline::{AuthPipeline, LoginRequest};
pub use session::{Persistence, SessionRecord, SessionStore};
pub use transport::{RequestDescriptor, Transport, TransportResponse};
