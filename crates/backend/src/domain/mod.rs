//! Domain types - core business entities
//!
//! Groups, their repositories and domains, and the configuration file. These
//! types describe what is backed up and where; the on-disk representation of a
//! domain is handled by [`crate::state`].

pub mod config;
pub mod error;
pub mod group;
pub mod repository;
pub mod symlink;
pub mod unit;

pub use error::RegistryError;
pub use group::{Group, Registry};
pub use repository::{Repository, RepositoryScope};
pub use symlink::SymlinkProxy;
pub use unit::{Domain, DomainRecord};
