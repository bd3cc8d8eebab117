//! MediaHub API Server

use mediahub_api::auth::{
    AuthService, CredentialStore, InMemoryCredentialStore, JwtConfig, PasswordConfig,
    PgCredentialStore,
};
use mediahub_api::{create_router, state::AppState};
use mediahub_core::config::{AppConfig, LoggingConfig};
use mediahub_core::LocalMediaStore;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);
    config.validate()?;

    let store: Arc<dyn CredentialStore> = match &config.database.postgres_url {
        Some(url) => {
            let store = PgCredentialStore::connect(url, config.database.postgres_pool_size).await?;
            store.migrate().await?;
            tracing::info!("Connected to PostgreSQL credential store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory credential store (data is lost on restart)");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    let media = Arc::new(LocalMediaStore::new(
        config.media.upload_dir.clone(),
        config.media.public_base_url.clone(),
    ));

    let auth = AuthService::new(
        store,
        media,
        JwtConfig::from(&config.auth),
        PasswordConfig::from(&config.auth),
    )?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, auth));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("MediaHub API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// `MEDIAHUB_CONFIG` names a TOML file; the environment overrides it
fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("MEDIAHUB_CONFIG") {
        Ok(path) => AppConfig::from_file(path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "mediahub_api={level},mediahub_core={level},tower_http=debug",
            level = logging.level
        )
        .into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}
