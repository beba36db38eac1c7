//! # rollback
//!
//! Revert pending changes across several version-control backends and
//! reconcile tracking state afterwards.
//!
//! The orchestration lives in [`core`]; [`workspace`] provides the local
//! collaborators the `rollback` binary runs against.

pub use rollback_core as core;
pub use rollback_workspace as workspace;
