//! Domain models for hivemesh.
//!
//! These are the core types shared across all crates.

pub mod group;
pub mod invite;
pub mod membership;
pub mod organization;
pub mod profile;
pub mod role;
pub mod thing;
pub mod user;
