//! Read-only HTTP status API.

use crate::engine::BanEngine;
use crate::models::{BanRecord, ScheduleConfig, SubjectId, Target};
use crate::scheduler::ScheduleHandle;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<BanEngine>,
    pub schedule: ScheduleHandle,
}

/// Build the API router.
pub fn build_router(state: ApiState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/bans", get(list_bans))
        .route("/api/v1/bans/:subject_id", get(get_ban))
        .route("/api/v1/targets", get(list_targets))
        .route("/api/v1/schedule", get(get_schedule))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn list_bans(State(state): State<ApiState>) -> Json<Vec<BanRecord>> {
    Json(state.engine.list_bans().await)
}

async fn get_ban(
    State(state): State<ApiState>,
    Path(subject_id): Path<u64>,
) -> Result<Json<BanRecord>, StatusCode> {
    state
        .engine
        .get_ban(SubjectId(subject_id))
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn list_targets(State(state): State<ApiState>) -> Result<Json<Vec<Target>>, StatusCode> {
    match state.engine.list_targets().await {
        Ok(targets) => Ok(Json(targets)),
        Err(e) => {
            tracing::error!("Failed to list targets: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn get_schedule(State(state): State<ApiState>) -> Json<ScheduleConfig> {
    Json(state.schedule.current().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BanRequest;
    use crate::scheduler::{Scheduler, SystemClock};
    use crate::testing::Fixture;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn router(fx: &Fixture) -> Router {
        let (_scheduler, schedule) = Scheduler::new(
            fx.engine.clone(),
            Arc::new(SystemClock),
            ScheduleConfig::default(),
        );
        build_router(ApiState {
            engine: fx.engine.clone(),
            schedule,
        })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn bans_and_targets() {
        let fx = Fixture::new(&[(1, "alpha")]).await;
        fx.engine
            .apply_ban(BanRequest {
                subject_id: SubjectId(5),
                name: "eve".to_string(),
                reason: None,
                duration: "/".to_string(),
            })
            .await
            .unwrap();

        let (status, bans) = get_json(router(&fx).await, "/api/v1/bans").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bans[0]["subject_id"], 5);
        assert_eq!(bans[0]["reason"], "Not Given");

        let (status, ban) = get_json(router(&fx).await, "/api/v1/bans/5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ban["name"], "eve");

        let (status, _) = get_json(router(&fx).await, "/api/v1/bans/6").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, targets) = get_json(router(&fx).await, "/api/v1/targets").await;
        assert_eq!(targets[0]["name"], "alpha");
    }

    #[tokio::test]
    async fn schedule_defaults_to_weekly() {
        let fx = Fixture::new(&[]).await;
        let (status, schedule) = get_json(router(&fx).await, "/api/v1/schedule").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(schedule["cadence"], "weekly");
    }
}
