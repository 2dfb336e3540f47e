//! Application layer for taskrail.
//!
//! This crate owns the client-side session and consistency logic shared by
//! every interface: credential persistence, the authentication state machine,
//! the task cache coordinator, and the mutation pipeline.

pub mod auth;
pub mod config;
pub mod credential;
pub mod gateway;
pub mod mutation;
pub mod task_cache;

// Re-exports for convenience
pub use auth::{AuthError, AuthManager, AuthPhase, AuthState};
pub use config::{ApiConfig, AppConfig};
pub use credential::{CredentialError, CredentialStore};
pub use gateway::RemoteGateway;
pub use mutation::{
    DeleteConfirmation, DeleteOutcome, MutationError, Notice, NoticeLevel, Notifier, TaskMutator,
};
pub use task_cache::{CacheScope, TaskCacheCoordinator, TaskCollectionView};
