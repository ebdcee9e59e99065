//! # scubactl: Backend Control Plane for the Scuba Chat Application
//!
//! `scubactl` is the HTTP backend behind the Scuba chat frontend. It exposes a
//! REST API under `/api/*` for account management, conversations, custom
//! instructions, and system settings, and proxies chat turns to Groq's
//! OpenAI-compatible completions API.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the
//! HTTP layer and uses PostgreSQL (via sqlx) for all persistence. Requests are
//! authenticated with JWT bearer tokens: a short-lived access token for normal
//! calls and a long-lived refresh token accepted only by `/api/auth/refresh`.
//!
//! A chat turn (`POST /api/chat/conversations/{id}/messages`) reads the stored
//! history, prepends the user's default custom instruction (or the built-in
//! system prompt), calls the configured [`ai::ChatProvider`], and persists both
//! halves of the exchange in one transaction. A provider failure surfaces as
//! 502 and persists nothing.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use scubactl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = scubactl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     scubactl::telemetry::init_telemetry();
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs
//! migrations on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! scubactl::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod ai;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::ai::{groq::GroqProvider, ChatProvider};
use crate::auth::password;
use crate::db::handlers::{repository::Repository, users::Users};
use crate::db::models::users::{UserCreateDBRequest, UserUpdateDBRequest};
use crate::openapi::ApiDoc;
use axum::http::HeaderValue;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, info, instrument, Level};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ConversationId, InstructionId, MessageId, SettingId, UserId};

/// Application state shared across all request handlers.
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration
/// - `ai`: Chat completion provider (Groq in production, canned in tests)
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub ai: Arc<dyn ChatProvider>,
}

/// Get the scubactl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: creates the admin on first startup, and on subsequent startups
/// updates the password when one is configured. Returns the admin's user id.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(
    username: &str,
    email: &str,
    password: Option<&str>,
    db: &PgPool,
) -> anyhow::Result<UserId> {
    let password_hash = password.map(password::hash_string).transpose()?;

    let mut tx = db.begin().await?;
    let mut users = Users::new(&mut tx);

    if let Some(existing) = users.get_by_username(username).await? {
        if let Some(password_hash) = password_hash {
            let mut users = Users::new(&mut tx);
            users
                .update(
                    existing.id,
                    &UserUpdateDBRequest {
                        password_hash: Some(password_hash),
                        ..Default::default()
                    },
                )
                .await?;
        }
        tx.commit().await?;
        return Ok(existing.id);
    }

    let created = users
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: email.to_string(),
            is_admin: true,
            password_hash,
        })
        .await?;

    tx.commit().await?;
    info!("Created initial admin user '{username}'");
    Ok(created.id)
}

/// Connect to the database, run migrations, and seed the admin user.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPool::connect(&config.database_url).await?;
    migrator().run(&pool).await?;

    create_initial_admin_user(
        &config.admin.username,
        &config.admin.email,
        config.admin.initial_password.as_deref(),
        &pool,
    )
    .await?;

    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = if config.cors_origin == "*" {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any)
    };
    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, chat, health, instructions, settings};

    let api_routes = Router::new()
        .route("/health", get(health::health))
        // Authentication and account management
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/profile", get(auth::get_profile).put(auth::update_profile))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/users", get(auth::list_users))
        .route("/auth/users/{id}/toggle-active", post(auth::toggle_user_active))
        // Conversations and messages
        .route(
            "/chat/conversations",
            get(chat::list_conversations).post(chat::create_conversation),
        )
        .route(
            "/chat/conversations/{id}",
            get(chat::get_conversation).delete(chat::delete_conversation),
        )
        .route("/chat/conversations/{id}/title", put(chat::rename_conversation))
        .route("/chat/conversations/{id}/messages", post(chat::send_message))
        .route(
            "/chat/conversations/{id}/messages/{message_id}",
            delete(chat::delete_message),
        )
        .route("/chat/models", get(chat::list_models))
        // Custom instructions
        .route(
            "/settings/instructions",
            get(instructions::list_instructions).post(instructions::create_instruction),
        )
        .route(
            "/settings/instructions/{id}",
            get(instructions::get_instruction)
                .put(instructions::update_instruction)
                .delete(instructions::delete_instruction),
        )
        .route(
            "/settings/instructions/{id}/set-default",
            post(instructions::set_default_instruction),
        )
        // System settings. GET takes the path segment as a key string; PUT and
        // DELETE parse it as a setting id.
        .route(
            "/settings/system",
            get(settings::list_system_settings).post(settings::create_system_setting),
        )
        .route(
            "/settings/system/{id}",
            get(settings::get_system_setting)
                .put(settings::update_system_setting)
                .delete(settings::delete_system_setting),
        )
        .route("/settings/preferences", get(settings::get_preferences))
        .route("/settings/export", get(settings::export_data))
        .with_state(state.clone());

    let router = Router::new()
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()));

    let router = router.layer(create_cors_layer(&state.config)?).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The fully-initialized application: pool connected, migrations run, admin
/// seeded, router built. [`Application::serve`] binds and runs it.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting scubactl with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;
        let ai: Arc<dyn ChatProvider> = Arc::new(GroqProvider::new(&config.groq)?);

        let state = AppState::builder().db(pool.clone()).config(config.clone()).ai(ai).build();
        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "scubactl listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
