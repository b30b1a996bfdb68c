use std::{process, sync::Arc, time::Duration};

use quire::{
    application::{
        error::AppError,
        posts::{PostService, PostWriteService},
        repos::{PostsRepo, PostsWriteRepo},
        search::SearchService,
    },
    cache::{self, CacheConfig, CacheHooks, PostIndexCache, TieredCache},
    config,
    infra::{
        cache_warmer::CacheWarmer,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, PublicState},
        telemetry,
    },
};
use tokio::{sync::watch, try_join};
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Warm(_) => run_warm(settings).await,
    }
}

struct CacheContext {
    config: CacheConfig,
    cache: Arc<TieredCache>,
}

fn build_cache(settings: &config::Settings) -> CacheContext {
    let config = CacheConfig::from(&settings.cache);
    let backing = cache::backing::from_config(&config);
    let cache = Arc::new(TieredCache::new(&config, backing));
    info!(
        backing = %cache.backing_mode(),
        l1_max_ttl_secs = config.l1_max_ttl_seconds,
        "cache initialised"
    );
    CacheContext { config, cache }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let CacheContext { config, cache } = build_cache(&settings);

    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories;

    let index = Arc::new(PostIndexCache::new(cache.clone(), posts_repo.clone(), &config));
    let hooks = Arc::new(CacheHooks::new(cache.clone(), config.entity_ttl()));

    let public_state = PublicState {
        posts: Arc::new(PostService::new(
            cache,
            index,
            posts_repo.clone(),
            config.entity_ttl(),
        )),
        search: Arc::new(SearchService::new(posts_repo.clone())),
        db: posts_repo,
    };
    let admin_state = AdminState {
        writes: Arc::new(PostWriteService::new(posts_write_repo, hooks)),
    };

    serve_http(&settings, public_state, admin_state).await
}

async fn run_warm(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let CacheContext { config, cache } = build_cache(&settings);

    let warmer = CacheWarmer::new(
        repositories,
        cache,
        config.entity_ttl(),
        settings.cache.warm_limit.get(),
    );
    let report = warmer
        .warm()
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    info!(cached = report.cached, "warm complete");
    Ok(())
}

async fn serve_http(
    settings: &config::Settings,
    public_state: PublicState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(public_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_addr = settings.server.public_addr;
    let admin_addr = settings.server.admin_addr;
    let public_listener = tokio::net::TcpListener::bind(public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(public_addr, err)))?;
    let admin_listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(admin_addr, err)))?;

    info!(%public_addr, %admin_addr, "listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(err) => {
                warn!(error = %err, "could not install shutdown handler");
                std::future::pending::<()>().await;
            }
        }
    });

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));

    let servers = async {
        try_join!(public_server, admin_server)
            .map(|_| ())
            .map_err(|err| AppError::unexpected(format!("server error: {err}")))
    };

    tokio::select! {
        result = servers => result,
        () = shutdown_deadline(shutdown_rx, settings.server.graceful_shutdown) => {
            warn!(
                grace_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out, dropping open connections"
            );
            Ok(())
        }
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn shutdown_deadline(rx: watch::Receiver<bool>, grace: Duration) {
    wait_for_shutdown(rx).await;
    tokio::time::sleep(grace).await;
}
