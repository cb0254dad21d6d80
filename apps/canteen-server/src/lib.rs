//! # Canteen Server
//!
//! axum JSON API over the canteen raffle ticket engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Canteen Server                                 │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │ /api/tickets   │  │ /api/users     │  │ /auth                      ││
//! │  │                │  │                │  │                            ││
//! │  │ • purchase     │  │ • list/create  │  │ • login  (rate limited)    ││
//! │  │ • cancel       │  │ • update       │  │ • logout                   ││
//! │  │ • draw / reset │  │ • password     │  │ • me                       ││
//! │  │ • config       │  │ • delete       │  │                            ││
//! │  │ • reports      │  │                │  │                            ││
//! │  └───────┬────────┘  └───────┬────────┘  └─────────────┬──────────────┘│
//! │          ▼                   ▼                         ▼               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  TicketService        UserService        JwtManager              │  │
//! │  │  TicketNotifier       LoginAttemptStore  (memory / Redis)        │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │          ▼                                                              │
//! │  canteen-db (SQLite)                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables, see [`config::ServerConfig::load`]:
//! - `CANTEEN_HTTP_PORT` - listen port (default: 3000)
//! - `CANTEEN_DB_PATH` - SQLite file (default: ./canteen.db)
//! - `JWT_SECRET` / `JWT_LIFETIME_SECS` - session tokens (default lifetime: 8h)
//! - `REDIS_URL` - shared login-attempt store (optional)
//! - `LOGIN_MAX_ATTEMPTS` / `LOGIN_LOCKOUT_SECS` - login throttling (5 / 900)
//! - `ADMIN_USERNAME` / `ADMIN_PASSWORD` - bootstrap admin (optional)

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod notifier;
pub mod rate_limit;
pub mod services;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use canteen_db::Database;

use crate::auth::JwtManager;
use crate::config::ServerConfig;
use crate::notifier::TicketNotifier;
use crate::rate_limit::LoginAttemptStore;
use crate::services::{TicketService, UserService};

// Re-exports
pub use config::ServerConfig as Config;
pub use error::{ApiError, ApiResult};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub tickets: TicketService,
    pub users: UserService,
}

impl AppState {
    pub fn new(
        db: Database,
        config: &ServerConfig,
        notifier: Arc<dyn TicketNotifier>,
        login_attempts: Arc<dyn LoginAttemptStore>,
    ) -> Self {
        AppState {
            jwt: Arc::new(JwtManager::new(
                config.jwt_secret.clone(),
                config.jwt_lifetime_secs,
            )),
            tickets: TicketService::new(db.clone(), notifier),
            users: UserService::new(db.clone(), login_attempts),
            db,
        }
    }

    /// Replaces the ticket service (seeded draws in tests).
    pub fn with_ticket_service(mut self, tickets: TicketService) -> Self {
        self.tickets = tickets;
        self
    }
}

/// Builds the full HTTP router.
pub fn build_router(state: AppState) -> Router {
    use handlers::{auth as session, health, tickets, users};

    let ticket_routes = Router::new()
        .route("/", get(tickets::list))
        .route("/purchase", post(tickets::purchase))
        .route("/draw", post(tickets::draw))
        .route("/all", axum::routing::delete(tickets::delete_all))
        .route(
            "/config",
            get(tickets::public_config).put(tickets::update_config),
        )
        .route("/config/admin", get(tickets::admin_config))
        .route("/seller-report", get(tickets::seller_report))
        .route("/stats", get(tickets::stats))
        .route("/seller/stats", get(tickets::seller_stats))
        .route("/logs", get(tickets::logs))
        .route("/{id}/cancel", post(tickets::cancel))
        .route("/{id}/reset-winner", put(tickets::reset_winner))
        .route("/{id}/batch", get(tickets::batch))
        .route("/{id}/resend", post(tickets::resend));

    let user_routes = Router::new()
        .route("/", get(users::list).post(users::create))
        .route("/{id}", put(users::update).delete(users::delete))
        .route("/{id}/password", put(users::change_password));

    Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(session::login))
        .route("/auth/logout", post(session::logout))
        .route("/auth/me", get(session::me))
        .nest("/api/tickets", ticket_routes)
        .nest("/api/users", user_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
