use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod database;
mod error;
mod middleware;
mod models;
mod repositories;
mod routes;
mod session;
mod validation;
mod views;

use sqlx::SqlitePool;
use tokio::net::TcpListener;

use crate::repositories::UserRepository;
use crate::session::{SessionConfig, SessionStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub user_repository: UserRepository,
    pub sessions: SessionStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting portal service");

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let user_repository = UserRepository::new(pool.clone());

    // Create schema and seed the default admin on first run
    database::init(&pool, &user_repository).await?;

    let sessions = SessionStore::new(SessionConfig::from_env());

    let app_state = AppState {
        db_pool: pool,
        user_repository,
        sessions,
    };

    info!("Portal service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let bind_addr =
        std::env::var("PORTAL_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Portal service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
