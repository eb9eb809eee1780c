#![doc = include_str!("../README.md")]

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod error;
pub mod headers;
#[cfg(feature = "idp")]
pub mod identity;
pub mod loss;
pub mod manager;
pub mod scope;
pub mod session;
pub mod store;
pub mod token;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "api")]
pub use api::{ApiClient, CommentService, PostService, UserService};
pub use config::ClientConfig;
pub use error::Error;
pub use headers::HeaderBuilder;
#[cfg(feature = "idp")]
pub use identity::{IdentityClient, IdpErrorKind};
pub use loss::{LossHandler, MemoryNavigator, Navigator};
pub use manager::SessionManager;
pub use scope::{Scope, ScopeHandle};
pub use session::SessionValidator;
pub use store::{CredentialStore, MemoryStorage, Storage};
pub use token::{DecodedClaims, decode, is_expired, is_expired_at};
pub use types::{LossReason, SessionState, SubjectId, TokenSet, UserProfile};
