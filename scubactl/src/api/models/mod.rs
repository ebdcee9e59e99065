//! API request/response models.
//!
//! These are the wire-format DTOs. They deliberately exclude internal fields
//! (password hashes, foreign keys the client already knows) that the `db`
//! layer models carry.

pub mod auth;
pub mod chat;
pub mod instructions;
pub mod settings;
pub mod users;
