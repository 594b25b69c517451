mod cleanup;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use atrium_api::email::{EmailService, Mailer};
use atrium_api::middleware::require_auth;
use atrium_api::rate_limit::{self, limit_by_ip};
use atrium_api::{AppState, AppStateInner, admin, auth, leads, reset, wizard};
use atrium_db::Database;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atrium=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("ATRIUM_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: ATRIUM_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db_path = std::env::var("ATRIUM_DB_PATH").unwrap_or_else(|_| "atrium.db".into());
    let host = std::env::var("ATRIUM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ATRIUM_PORT")
        .unwrap_or_else(|_| "4000".into())
        .parse()?;
    let frontend_base_url = std::env::var("ATRIUM_FRONTEND_URL")
        .unwrap_or_else(|_| "http://localhost:5173".into())
        .trim_end_matches('/')
        .to_string();
    let reset_rate: u32 = std::env::var("ATRIUM_RESET_RATE_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5); // requests per minute per IP

    // Init database
    let db = Database::open(&PathBuf::from(&db_path))?;
    seed_admin(&db)?;

    // Mailer: SMTP when configured, otherwise .eml files for development
    let mail_from =
        std::env::var("ATRIUM_MAIL_FROM").unwrap_or_else(|_| "Atrium <no-reply@atrium.local>".into());
    let mailer: Arc<dyn Mailer> = match std::env::var("ATRIUM_SMTP_HOST") {
        Ok(smtp_host) => {
            let smtp_port: u16 = std::env::var("ATRIUM_SMTP_PORT")
                .unwrap_or_else(|_| "587".into())
                .parse()?;
            let username = std::env::var("ATRIUM_SMTP_USERNAME").unwrap_or_default();
            let password = std::env::var("ATRIUM_SMTP_PASSWORD").unwrap_or_default();
            Arc::new(EmailService::smtp(
                &smtp_host, smtp_port, &username, &password, &mail_from,
            )?)
        }
        Err(_) => {
            let outbox = std::env::var("ATRIUM_MAIL_DIR").unwrap_or_else(|_| "./outbox".into());
            info!("No SMTP configured; writing reset emails to {}", outbox);
            Arc::new(EmailService::file(Path::new(&outbox), &mail_from)?)
        }
    };

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        frontend_base_url,
        mailer,
        reset_limiter: rate_limit::reset_limiter(reset_rate),
    });

    // Background cleanup task (runs every hour)
    tokio::spawn(cleanup::run_cleanup_loop(state.clone(), 3600));

    // Routes
    let reset_routes = Router::new()
        .route("/api/auth/request-reset", post(reset::request_reset))
        .route("/api/auth/perform-reset", post(reset::perform_reset))
        .layer(middleware::from_fn_with_state(state.clone(), limit_by_ip))
        .with_state(state.clone());

    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/leads", post(leads::create_lead))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/cleanup-tokens", post(reset::cleanup_tokens))
        .route("/api/wizard/save", post(wizard::save_step))
        .route("/api/wizard/submit", post(wizard::submit))
        .route("/api/wizard", get(wizard::get_own))
        .route("/api/wizard/{client_id}", get(wizard::get_for_client))
        .route("/api/admin/wizards", get(admin::list_client_wizards))
        .route("/api/admin/stats", get(admin::dashboard_stats))
        .route("/api/admin/clients", get(admin::list_clients))
        .route(
            "/api/admin/clients/{client_id}/validate",
            post(admin::validate_client),
        )
        .route("/api/admin/leads", get(admin::list_leads))
        .route("/api/admin/leads/{lead_id}", patch(admin::update_lead))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(reset_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Atrium server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Provision the first admin account from env when the table is empty.
fn seed_admin(db: &Database) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var("ATRIUM_ADMIN_EMAIL"),
        std::env::var("ATRIUM_ADMIN_PASSWORD"),
    ) else {
        return Ok(());
    };

    if db.count_admins()? > 0 {
        return Ok(());
    }

    let email = auth::normalize_email(&email);
    let password_hash = auth::hash_password(&password)?;
    db.create_admin(
        &Uuid::new_v4().to_string(),
        "Administrator",
        &email,
        &password_hash,
        Utc::now(),
    )?;
    info!("Seeded initial admin account {}", email);
    Ok(())
}
