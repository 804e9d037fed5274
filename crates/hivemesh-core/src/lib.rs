//! hivemesh core: domain models, the error taxonomy, and the traits
//! through which the service core reaches storage, cache,
//! authorization, directory and notification collaborators.

pub mod error;
pub mod external;
pub mod models;
pub mod repository;

pub use error::{HivemeshError, HivemeshResult};
