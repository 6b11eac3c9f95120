//! Bureau API server: loads config from env (and `.env`), ensures the database and member table
//! exist, then serves the member API under `/api` and uploaded files under `/uploads`.

use bureau_api::{
    api_routes, common_routes, ensure_database_exists, ensure_member_table, uploaded_files, AppState,
    DiskMediaStore, MemberService, PgMemberStore, ServerConfig, TokenAuth,
};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bureau_api=info,bureau_server=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    ensure_database_exists(&config.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    ensure_member_table(&pool, &config.schema).await?;

    let store = PgMemberStore::new(pool, &config.schema, config.lock_timeout);
    let state = AppState {
        members: MemberService::new(Arc::new(store)),
        auth: Arc::new(TokenAuth::new(config.auth_secret.as_bytes())),
        media: Arc::new(DiskMediaStore::new(&config.upload_dir)),
    };

    let app = Router::new()
        .merge(common_routes(state.clone()))
        .nest("/api", api_routes(state))
        .merge(uploaded_files(&config.upload_dir))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}
