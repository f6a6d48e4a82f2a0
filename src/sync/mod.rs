//! Event synchronization: fetch from every provider, classify, reconcile, report.

pub mod classifier;
pub mod reconciler;
pub mod runner;

use thiserror::Error;

use crate::db::StoreError;

pub use reconciler::EventReconciler;
pub use runner::SyncRunner;

/// Failures that abort a whole sync pass. Per-event problems never show up here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
    #[error("sync task failed: {0}")]
    Task(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}
