use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aligna=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("ALIGNA_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("ALIGNA_DB_PATH").unwrap_or_else(|_| "aligna.db".into());
    let host = std::env::var("ALIGNA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ALIGNA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    let db = aligna_db::Database::open(&PathBuf::from(&db_path))?;
    let app = aligna_server::router(aligna_server::app_state(db, jwt_secret));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Aligna chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
