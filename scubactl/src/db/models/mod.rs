//! Database record structures and request/response DTOs.

pub mod conversations;
pub mod instructions;
pub mod messages;
pub mod settings;
pub mod users;
