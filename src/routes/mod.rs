pub mod auth_routes;
pub mod health;
pub mod playback;
pub mod proctor;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::rate_limit::{rps_middleware, RateLimiter};
use crate::AppState;

/// Full application router. Login routes share one per-second limiter.
pub fn build_router(state: AppState, public_rps: u32) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let login_api = Router::new()
        .route("/api/candidate/login", post(auth_routes::candidate_login))
        .route("/api/recruiter/login", post(auth_routes::recruiter_login))
        .layer(axum::middleware::from_fn_with_state(
            RateLimiter::new(public_rps),
            rps_middleware,
        ));

    let verify_api = Router::new()
        .route("/api/candidate/verify", get(auth_routes::candidate_verify))
        .route("/api/recruiter/verify", get(auth_routes::recruiter_verify));

    let proctor_api = Router::new()
        .route("/api/proctor/session/start", post(proctor::start_session))
        .route("/api/proctor/session/end", post(proctor::end_session))
        .route("/api/proctor/session/heartbeat", post(proctor::heartbeat))
        .route("/api/proctor/log-event", post(proctor::log_event))
        .route(
            "/api/proctor/session/:id/summary",
            get(proctor::session_summary),
        )
        .route(
            "/api/proctor/candidate/:id/sessions",
            get(proctor::candidate_sessions),
        );

    let playback_api = Router::new()
        .route("/api/playback/record", post(playback::record_playback))
        .route(
            "/api/playback/session/:session_id/question/:question_id",
            get(playback::get_playback),
        );

    base_routes
        .merge(login_api)
        .merge(verify_api)
        .merge(proctor_api)
        .merge(playback_api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
