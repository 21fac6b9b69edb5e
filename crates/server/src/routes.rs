//! HTTP routes

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use contracts::{ReplayState, TelemetryProvider, Timeline};
use ingestion::IngestOutcome;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::service::ReplayService;
use crate::telemetry::http_metrics_middleware;

const API_NAME: &str = "F1 Historic Race Replayer API";

/// Build the HTTP API router
pub fn build_router<P>(service: Arc<ReplayService<P>>) -> Router
where
    P: TelemetryProvider + Send + Sync + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", get(api_info::<P>))
        .route("/api/health", get(health_check))
        .route("/api/demo", get(demo::<P>))
        .route("/api/replay/:session_key/state", get(replay_state::<P>))
        .route("/api/replay/:session_key/timeline", get(timeline::<P>))
        .route("/api/load-race", post(load_race::<P>))
        .route("/api/admin/load-session/:session_key", post(load_session::<P>))
        .with_state(service)
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Endpoint links for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLinks {
    pub state: String,
    pub timeline: String,
}

impl SessionLinks {
    fn for_session(session_key: &str) -> Self {
        Self {
            state: format!("/api/replay/{session_key}/state"),
            timeline: format!("/api/replay/{session_key}/timeline"),
        }
    }
}

/// Ready-to-use example requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleUsage {
    pub get_timeline: String,
    pub get_state_at_start: String,
}

impl ExampleUsage {
    fn for_links(links: &SessionLinks) -> Self {
        Self {
            get_timeline: links.timeline.clone(),
            get_state_at_start: format!("{}?t=<epoch_seconds>", links.state),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiInfo {
    pub message: String,
    pub version: String,
    pub demo_session: Option<String>,
}

/// `/api/demo` body; the session fields are present only when a demo is loaded
#[derive(Debug, Serialize, Deserialize)]
pub struct DemoResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<SessionLinks>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_usage: Option<ExampleUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadRaceResponse {
    pub success: bool,
    pub message: String,
    pub session_key: String,
    pub endpoints: SessionLinks,
    pub example_usage: ExampleUsage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadSessionResponse {
    pub message: String,
    /// False when the session was already stored
    pub ingested: bool,
}

#[derive(Debug, Deserialize)]
pub struct StateQuery {
    pub t: f64,
}

#[derive(Debug, Deserialize)]
pub struct LoadRaceQuery {
    pub race_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadSessionQuery {
    pub name: Option<String>,
    pub country: Option<String>,
}

async fn health_check() -> &'static str {
    "OK"
}

async fn api_info<P>(State(service): State<Arc<ReplayService<P>>>) -> Json<ApiInfo>
where
    P: TelemetryProvider + Send + Sync + 'static,
{
    Json(ApiInfo {
        message: API_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        demo_session: service.demo_session(),
    })
}

async fn demo<P>(
    State(service): State<Arc<ReplayService<P>>>,
) -> Result<Json<DemoResponse>, ApiError>
where
    P: TelemetryProvider + Send + Sync + 'static,
{
    let Some(session_key) = service.demo_session() else {
        return Ok(Json(DemoResponse {
            success: false,
            session_key: None,
            session_name: None,
            status: None,
            endpoints: None,
            example_usage: None,
            message: Some("No demo session available".to_string()),
            suggestion: Some(
                "Use POST /api/load-race?race_name=Bahrain GP 2023 to load a race".to_string(),
            ),
        }));
    };

    let session_name = service.session_name(&session_key).await?;
    let links = SessionLinks::for_session(&session_key);
    Ok(Json(DemoResponse {
        success: true,
        session_name,
        status: Some("ready".to_string()),
        example_usage: Some(ExampleUsage::for_links(&links)),
        endpoints: Some(links),
        session_key: Some(session_key),
        message: None,
        suggestion: None,
    }))
}

async fn replay_state<P>(
    State(service): State<Arc<ReplayService<P>>>,
    Path(session_key): Path<String>,
    query: Result<Query<StateQuery>, QueryRejection>,
) -> Result<Json<ReplayState>, ApiError>
where
    P: TelemetryProvider + Send + Sync + 'static,
{
    let Query(StateQuery { t }) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    match service.get_replay_state(&session_key, t).await? {
        Some(state) => Ok(Json(state)),
        None => Err(ApiError::NotFound(format!(
            "No data found for session {session_key} at timestamp {t}"
        ))),
    }
}

async fn timeline<P>(
    State(service): State<Arc<ReplayService<P>>>,
    Path(session_key): Path<String>,
) -> Result<Json<Timeline>, ApiError>
where
    P: TelemetryProvider + Send + Sync + 'static,
{
    match service.get_timeline(&session_key).await? {
        Some(timeline) => Ok(Json(timeline)),
        None => Err(ApiError::NotFound(format!(
            "No timeline data found for session {session_key}"
        ))),
    }
}

/// `POST /api/load-race?race_name=...`
///
/// 404 when the name cannot be parsed or no race session is listed upstream.
/// A listed race whose ingest fails (fetch, timeout, store) is a 500, not a 404.
async fn load_race<P>(
    State(service): State<Arc<ReplayService<P>>>,
    query: Result<Query<LoadRaceQuery>, QueryRejection>,
) -> Result<Json<LoadRaceResponse>, ApiError>
where
    P: TelemetryProvider + Send + Sync + 'static,
{
    let Query(LoadRaceQuery { race_name }) =
        query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let Some(session_key) = service.ingest_by_race_name(&race_name).await? else {
        return Err(ApiError::NotFound(format!(
            "Could not find or load race: {race_name}. \
             Try races like 'Bahrain GP 2023', 'Monaco 2024', etc."
        )));
    };

    let endpoints = SessionLinks::for_session(&session_key);
    Ok(Json(LoadRaceResponse {
        success: true,
        message: format!("Successfully loaded race: {race_name}"),
        example_usage: ExampleUsage::for_links(&endpoints),
        endpoints,
        session_key,
    }))
}

async fn load_session<P>(
    State(service): State<Arc<ReplayService<P>>>,
    Path(session_key): Path<String>,
    query: Result<Query<LoadSessionQuery>, QueryRejection>,
) -> Result<Json<LoadSessionResponse>, ApiError>
where
    P: TelemetryProvider + Send + Sync + 'static,
{
    let Query(params) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let outcome = service
        .ingest_session(&session_key, params.name.as_deref(), params.country.as_deref())
        .await?;

    Ok(Json(LoadSessionResponse {
        message: format!("Successfully loaded session {session_key}"),
        ingested: matches!(outcome, IngestOutcome::Ingested(_)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ServiceConfig;
    use ingestion::mock::{lap_record, position_record};
    use ingestion::{MockConfig, MockProvider, MockSession};
    use telemetry_store::TelemetryStore;
    use tokio::net::TcpListener;

    struct Harness {
        base_url: String,
        http: reqwest::Client,
        service: Arc<ReplayService<MockProvider>>,
        _dir: tempfile::TempDir,
    }

    async fn start(mock: MockProvider) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = TelemetryStore::open_with(&dir.path().join("api.db"), 2, 4).unwrap();
        let service = Arc::new(ReplayService::new(
            store,
            Arc::new(mock),
            &ServiceConfig::default(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(service.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Harness {
            base_url: format!("http://{addr}"),
            http: reqwest::Client::new(),
            service,
            _dir: dir,
        }
    }

    fn bahrain() -> MockProvider {
        let mock = MockProvider::new();
        mock.insert_session(
            "9158",
            MockSession {
                positions: vec![
                    position_record(1, "2023-03-05T15:00:00Z", 1),
                    position_record(16, "2023-03-05T15:00:00.200Z", 2),
                ],
                car_data: vec![],
                laps: vec![lap_record(16, 1, 98.0, None), lap_record(1, 1, 97.5, None)],
            },
        );
        mock
    }

    #[tokio::test]
    async fn info_and_health() {
        let h = start(MockProvider::new()).await;
        let health = h.http.get(format!("{}/api/health", h.base_url)).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "OK");

        let info: ApiInfo = h
            .http
            .get(format!("{}/api", h.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(info.message, API_NAME);
        assert_eq!(info.demo_session, None);
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let h = start(MockProvider::new()).await;
        let resp = h
            .http
            .get(format!("{}/api/replay/0000/state?t=100", h.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "No data found for session 0000 at timestamp 100");

        let resp = h
            .http
            .get(format!("{}/api/replay/0000/timeline", h.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn bad_timestamp_is_400() {
        let h = start(MockProvider::new()).await;
        for query in ["t=soon", "", "t=NaN"] {
            let resp = h
                .http
                .get(format!("{}/api/replay/9158/state?{query}", h.base_url))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 400, "query {query:?}");
        }
    }

    #[tokio::test]
    async fn load_session_then_replay() {
        let h = start(bahrain()).await;
        let resp: LoadSessionResponse = h
            .http
            .post(format!("{}/api/admin/load-session/9158?name=Bahrain%20GP", h.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp.message, "Successfully loaded session 9158");
        assert!(resp.ingested);

        let state: ReplayState = h
            .http
            .get(format!("{}/api/replay/9158/state?t=1678028400.3", h.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(state.cars.len(), 2);
        assert_eq!(state.cars[0].driver_number, 1);

        let timeline: Timeline = h
            .http
            .get(format!("{}/api/replay/9158/timeline", h.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let drivers: Vec<u32> = timeline.entries.iter().map(|e| e.driver_number).collect();
        assert_eq!(drivers, vec![1, 16]);
    }

    #[tokio::test]
    async fn failed_ingest_is_500() {
        let h = start(MockProvider::with_config(MockConfig {
            fail_positions: true,
            ..Default::default()
        }))
        .await;
        let resp = h
            .http
            .post(format!("{}/api/admin/load-session/9158", h.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "Internal server error");
    }

    #[tokio::test]
    async fn listed_race_that_fails_to_ingest_is_500() {
        let mock = MockProvider::with_config(MockConfig {
            fail_laps: true,
            ..Default::default()
        });
        mock.add_listing(contracts::UpstreamSession {
            session_key: "7953".to_string(),
            session_name: "Race".to_string(),
            session_type: "Race".to_string(),
            country_name: "Bahrain".to_string(),
            year: 2023,
            date_start: String::new(),
            date_end: String::new(),
        });
        let h = start(mock).await;

        let resp = h
            .http
            .post(format!("{}/api/load-race?race_name=Bahrain%20GP%202023", h.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        assert!(!h.service.store().session_exists("7953").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_race_is_404_and_demo_is_empty() {
        let h = start(MockProvider::new()).await;
        let resp = h
            .http
            .post(format!("{}/api/load-race?race_name=Atlantis%202023", h.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);

        let demo: DemoResponse = h
            .http
            .get(format!("{}/api/demo", h.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(!demo.success);
        assert_eq!(demo.message.as_deref(), Some("No demo session available"));
        assert!(h.service.demo_session().is_none());
    }
}
