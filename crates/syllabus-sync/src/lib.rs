//! Session-level curriculum sync for a learner device.
//!
//! The [`Orchestrator`] fetches the remote curriculum and latest server
//! backup, decides how to reconcile them with the locally stored state (see
//! [`reconcile::choose_strategy`]), persists the result together with a new
//! base snapshot, and uploads a backup in the background. It never fails:
//! network and storage errors degrade to "keep using the local state" and
//! are reported in the returned [`SyncReport`].

pub mod orchestrator;
pub mod reconcile;
pub mod report;

mod slots;

pub use orchestrator::Orchestrator;
pub use reconcile::{Reconciled, Strategy, choose_strategy, reconcile};
pub use report::{SessionState, SyncOutcome, SyncReport};
