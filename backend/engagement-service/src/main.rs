use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::info;

use engagement_service::db::{
    ContentRepository, CounterRepository, LikeRepository, SessionRepository, ViewEventRepository,
};
use engagement_service::handlers::{self, AppState};
use engagement_service::middleware::JwtAuthMiddleware;
use engagement_service::services::{
    CounterCache, LikeService, PlaybackService, ViewService,
};
use engagement_service::workers;
use engagement_service::ws::{session::counter_feed_ws, ConnectionRegistry};
use engagement_service::Config;

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "engagement-service",
    }))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    info!("Starting engagement-service");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        env = %config.app.env,
        http_port = config.app.http_port,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    sqlx::query("SELECT 1")
        .execute(&pg_pool)
        .await
        .context("Failed to verify database connection")?;
    info!("Database pool created and verified");

    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let redis_client =
        redis::Client::open(config.redis.url.clone()).context("Failed to parse REDIS_URL")?;
    let redis = redis_client
        .get_connection_manager()
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis connection manager ready");

    let registry = ConnectionRegistry::new();

    let like_repo = LikeRepository::new(pg_pool.clone());
    let view_repo = ViewEventRepository::new(pg_pool.clone());
    let session_repo = SessionRepository::new(pg_pool.clone());
    let counter_repo = CounterRepository::new(pg_pool.clone());
    let content_repo = ContentRepository::new(pg_pool.clone());

    let cache = CounterCache::new(redis, counter_repo.clone());

    let likes = LikeService::new(
        like_repo,
        counter_repo.clone(),
        content_repo.clone(),
        cache.clone(),
        registry.clone(),
    );
    let views = ViewService::new(
        view_repo,
        counter_repo,
        content_repo.clone(),
        cache.clone(),
        registry.clone(),
        config.engagement.view_threshold_secs,
    );
    let playback = PlaybackService::new(
        session_repo,
        views.clone(),
        content_repo,
        chrono::Duration::minutes(config.engagement.session_stale_minutes),
        config.engagement.completion_threshold,
    );

    let state = AppState {
        likes,
        views,
        playback,
        cache: cache.clone(),
    };

    tokio::spawn(workers::reconcile::run(
        cache,
        config.engagement.reconcile_interval_secs,
    ));
    info!(
        interval_secs = config.engagement.reconcile_interval_secs,
        "Counter reconciliation worker started"
    );

    let jwt_secret = config.auth.jwt_secret.clone();
    let bind_addr = (config.app.host.clone(), config.app.http_port);

    info!(
        host = %config.app.host,
        port = config.app.http_port,
        "HTTP server listening"
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(registry.clone()))
            .wrap(JwtAuthMiddleware::new(jwt_secret.clone()))
            .route("/health", web::get().to(health))
            .route(
                "/metrics",
                web::get().to(engagement_service::metrics::serve_metrics),
            )
            .route(
                "/ws/content/{content_type}/{content_id}",
                web::get().to(counter_feed_ws),
            )
            .service(
                web::scope("/content")
                    .route(
                        "/batch-metadata",
                        web::post().to(handlers::batch_metadata),
                    )
                    .route(
                        "/{content_type}/{content_id}/like",
                        web::post().to(handlers::toggle_like),
                    )
                    .route(
                        "/{content_type}/{content_id}/view",
                        web::post().to(handlers::record_view),
                    )
                    .route(
                        "/{content_type}/{content_id}/metadata",
                        web::get().to(handlers::get_metadata),
                    ),
            )
            .service(
                web::scope("/media")
                    .route(
                        "/playback/progress",
                        web::post().to(handlers::progress_playback),
                    )
                    .route(
                        "/playback/pause",
                        web::post().to(handlers::pause_playback),
                    )
                    .route(
                        "/playback/resume",
                        web::post().to(handlers::resume_playback),
                    )
                    .route("/playback/end", web::post().to(handlers::end_playback))
                    .route(
                        "/{id}/playback/start",
                        web::post().to(handlers::start_playback),
                    ),
            )
    })
    .bind(bind_addr)
    .context("Failed to bind HTTP server")?
    .run();

    tokio::select! {
        result = server => {
            result.context("HTTP server error")?;
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping engagement-service");
        }
    }

    Ok(())
}
