//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations for CRUD operations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Repositories wrap a `&mut PgConnection`, so they work equally over a pooled
//! connection or a transaction. Multi-statement mutations (e.g. clearing and
//! setting the default custom instruction) must be run inside a transaction
//! owned by the caller.

pub mod errors;
pub mod handlers;
pub mod models;
