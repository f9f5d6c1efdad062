//! civiq-core: Core library for the civiq civic issue platform
//!
//! Provides the data model, record storage, issue lifecycle engine and the
//! AI classification service. The HTTP surface and CLI live in their own
//! crates on top of this one.

pub mod classify;
pub mod comment;
pub mod config;
pub mod engine;
pub mod error;
pub mod id;
pub mod issue;
pub mod service;
pub mod store;
pub mod user;

pub use classify::{Classification, Classifier, OpenAiClassifier};
pub use comment::{Comment, NewComment};
pub use config::{
    ClassifierConfig, Config, MediaConfig, ServerConfig, StorageBackend, StorageConfig,
};
pub use engine::{Engine, IssueStats};
pub use error::Error;
pub use issue::{Category, Coordinates, Issue, NewIssue, Priority, Status, UpdateIssue};
pub use service::{ServiceManager, ServiceStatus};
pub use store::{open_store, IssueFilter, IssueQuery, JsonlStore, MemStore, RecordStore};
pub use user::User;

/// Result type for civiq operations
pub type Result<T> = std::result::Result<T, Error>;
