//! Shared vocabulary for Syllabus: curriculum trees, learner state, remote
//! payloads and the collaborator traits the sync engine and server are
//! written against.
//!
//! Nothing here touches the network or a database. Storage backends, the API
//! and the CLI client plug in by implementing [`store`] traits.

// Store traits are declared with RPITIT and implemented with `async fn`.
#![allow(async_fn_in_trait)]

pub mod curriculum;
pub mod error;
pub mod hash;
pub mod learner;
pub mod registry;
pub mod remote;
pub mod state;
pub mod store;

pub use error::{Error, Result};
