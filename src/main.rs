mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::{sync::Arc, time::Duration};

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use config::Config;
use db::{DBClient, LedgerStore};
use dotenv::dotenv;
use routes::create_router;
use service::{
    analytics_service::AnalyticsService,
    clock::{Clock, SystemClock},
    notification_service::{NotificationGateway, NotificationService, TransportGateway},
    referral::RandomCodes,
    referral_ledger::ReferralLedger,
    reward_service::RewardService,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: DBClient,
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<ReferralLedger>,
    pub rewards: Arc<RewardService>,
    pub analytics: Arc<AnalyticsService>,
}

impl AppState {
    /// Wires the services. The ledger store is separate from `db_client` so
    /// tests can swap in an in-memory one.
    pub fn new(
        env: Config,
        db_client: DBClient,
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let codes = Arc::new(RandomCodes);
        let notifications = NotificationService::new(
            gateway,
            Duration::from_secs(env.notification_timeout_secs),
        );

        let rewards = Arc::new(RewardService::new(
            store.clone(),
            clock.clone(),
            codes.clone(),
            notifications.clone(),
            env.reward_expiration_days,
        ));

        let ledger = Arc::new(ReferralLedger::new(
            store,
            rewards.clone(),
            notifications,
            clock.clone(),
            codes,
            env.app_url.clone(),
        ));

        let analytics = Arc::new(AnalyticsService::new(db_client.clone(), clock.clone()));

        AppState {
            env,
            db_client,
            clock,
            ledger,
            rewards,
            analytics,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let allowed_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([
            AUTHORIZATION,
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(middleware::CRON_KEY_HEADER),
        ])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let db_client = DBClient::new(pool);
    let gateway = Arc::new(TransportGateway::from_config(&config));
    let app_state = AppState::new(
        config.clone(),
        db_client.clone(),
        Arc::new(db_client),
        gateway,
    );

    let app = create_router(Arc::new(app_state)).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("server is running on http://localhost:{}", config.port);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("server stopped: {}", err);
    }
}
