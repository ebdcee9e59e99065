//! HTTP handlers for the REST API.

pub mod auth;
pub mod chat;
pub mod health;
pub mod instructions;
pub mod settings;
