//! Long-running tasks of dfb
//!
//! - [`Reconciler`]: periodic filesystem housekeeping of every domain
//! - [`pipeline`]: a backup run of one group to one repository
//!
//! Both only talk to the outside world through the filesystem, the restic
//! subprocess and `mpsc` channels; they share no in-memory state and can run
//! at the same time.

pub mod message;
pub mod mount;
pub mod pipeline;
mod reconciler;

#[cfg(test)]
mod __tests__;

pub use reconciler::{Reconciler, ReconcilerConfig, TickReport};
