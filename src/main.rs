use std::{process, sync::Arc};

use bannerflow::{
    application::{
        banners::{BannerError, BannerService, ServiceConfig},
        error::AppError,
    },
    cache::{CacheConfig, RedisStore, RemoteStore, TieredContentCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AuthTokens, HttpState},
        telemetry,
    },
};
use sqlx::postgres::PgPool;
use tokio::signal;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    connect_database(&settings).await?;
    info!("Database migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_database(&settings).await?;
    let store = Arc::new(PostgresRepositories::new(pool));

    let cache_config = CacheConfig::from(&settings.cache);
    let cache = match settings.redis.url.as_deref() {
        Some(url) => {
            let remote: Arc<dyn RemoteStore> = Arc::new(RedisStore::connect(url).await?);
            info!("Remote cache tier enabled");
            TieredContentCache::new(&cache_config, Some(remote))
        }
        None => {
            info!("No redis url configured; using the in-process cache only");
            TieredContentCache::local_only(&cache_config)
        }
    };

    let banners = BannerService::new(
        store,
        Arc::new(cache),
        ServiceConfig::from(&settings.service),
    );

    if settings.auth.admin_tokens.is_empty() && settings.auth.user_tokens.is_empty() {
        warn!("No access tokens configured; every banner route will answer 401");
    }
    let state = HttpState {
        banners: banners.clone(),
        auth: Arc::new(AuthTokens::new(
            settings.auth.user_tokens.clone(),
            settings.auth.admin_tokens.clone(),
        )),
    };

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|source| InfraError::Bind {
            addr: settings.server.addr,
            source,
        })?;
    info!(addr = %settings.server.addr, "Listening");

    axum::serve(listener, http::build_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    match banners.stop(settings.server.graceful_shutdown).await {
        Ok(()) => Ok(()),
        Err(BannerError::DeadlineExceeded) => Err(AppError::ShutdownTimedOut),
        Err(err) => Err(AppError::unexpected(err.to_string())),
    }
}

async fn connect_database(settings: &config::Settings) -> Result<PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(pool)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}
