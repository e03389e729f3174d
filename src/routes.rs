use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        analytics::analytics_handler,
        auth::auth_handler,
        business::business_handler,
        campaign::{campaign_handler, public_campaign_handler},
        customer::{customer_handler, public_customer_handler},
        maintenance::maintenance_handler,
        referral::{public_referral_handler, referral_handler},
        reward::reward_handler,
    },
    middleware::auth,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Shared links and landing pages hit these without a session
    let campaign_routes = Router::new()
        .merge(campaign_handler().layer(middleware::from_fn(auth)))
        .merge(public_campaign_handler());

    let customer_routes = Router::new()
        .merge(customer_handler().layer(middleware::from_fn(auth)))
        .merge(public_customer_handler());

    let referral_routes = Router::new()
        .merge(referral_handler().layer(middleware::from_fn(auth)))
        .merge(public_referral_handler());

    let api_route = Router::new()
        .nest("/auth", auth_handler())
        .nest(
            "/business",
            business_handler().layer(middleware::from_fn(auth)),
        )
        .nest("/campaigns", campaign_routes)
        .nest("/customers", customer_routes)
        .nest("/referrals", referral_routes)
        .nest(
            "/rewards",
            reward_handler().layer(middleware::from_fn(auth)),
        )
        .nest(
            "/analytics",
            analytics_handler().layer(middleware::from_fn(auth)),
        )
        .nest("/maintenance", maintenance_handler())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        db::{memory::MemoryStore, DBClient},
        middleware::CRON_KEY_HEADER,
        service::notification_service::RecordingGateway,
    };

    fn config(cron_secret: Option<&str>) -> Config {
        Config {
            database_url: "postgres://referly@127.0.0.1:1/referly_test".to_string(),
            app_url: "http://localhost:5173".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_maxage: 60,
            port: 8000,
            resend_api_key: None,
            from_email: "Referly <noreply@referly.app>".to_string(),
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_phone_number: None,
            notification_timeout_secs: 1,
            reward_expiration_days: 90,
            cron_secret: cron_secret.map(str::to_string),
            cors_origins: vec![],
        }
    }

    // The pool never connects. Anything that reaches SQL fails fast with a
    // pool timeout.
    fn app(cron_secret: Option<&str>) -> Router {
        let env = config(cron_secret);
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy(&env.database_url)
            .unwrap();
        let state = AppState::new(
            env,
            DBClient::new(pool),
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingGateway::default()),
        );
        create_router(Arc::new(state))
    }

    #[tokio::test]
    async fn health_is_public() {
        let response = app(None)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn campaign_list_requires_a_session() {
        let response = app(None)
            .oneshot(
                Request::builder()
                    .uri("/api/campaigns")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expiry_sweep_is_closed_without_a_configured_secret() {
        let response = app(None)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/maintenance/expire")
                    .header(CRON_KEY_HEADER, "anything")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn expiry_sweep_rejects_a_wrong_key() {
        let response = app(Some("s3cret"))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/maintenance/expire")
                    .header(CRON_KEY_HEADER, "guess")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expiry_sweep_runs_with_the_right_key() {
        let response = app(Some("s3cret"))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/maintenance/expire")
                    .header(CRON_KEY_HEADER, "s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_click_locator_is_not_found() {
        let response = app(None)
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/referrals/NOPE42/click")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn database_failures_do_not_leak_driver_text() {
        let response = app(None)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/login")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"email":"alice@example.com","password":"secret123"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "storage");
        assert_eq!(
            body["message"],
            "Something went wrong while saving your request"
        );
    }
}
