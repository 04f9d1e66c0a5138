//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `FirebaseAuth`: email/password sign-in, sign-up and token refresh
//! - `Session`: token-based session persisted to the cache directory
//! - `CredentialStore`: secure OS-level credential storage via keyring
//!
//! Firebase ID tokens live for one hour and are refreshed five minutes early.

pub mod credentials;
pub mod firebase;
pub mod session;

pub use credentials::CredentialStore;
pub use firebase::{AuthError, FirebaseAuth};
pub use session::{Session, SessionData};
