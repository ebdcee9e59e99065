//! Repository implementations for database operations.

pub mod conversations;
pub mod instructions;
pub mod messages;
pub mod repository;
pub mod settings;
pub mod users;
