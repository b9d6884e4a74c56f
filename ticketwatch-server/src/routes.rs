use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ticketwatch_common::{ApiResponse, AvailabilityRecord, EventId, MultipleAvailability};

use crate::catalog::{BookingError, Catalog};

/// Failures mapped onto HTTP status codes with an error envelope
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::NotFound(_) => ApiError::NotFound(e.to_string()),
            BookingError::InvalidQuantity => ApiError::BadRequest(e.to_string()),
            BookingError::NotBookable(_) | BookingError::Insufficient { .. } => ApiError::Conflict(e.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub event_id: EventId,
    pub quantity: i64,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Build the availability API
pub fn build_router(catalog: Arc<Catalog>, enable_cors: bool) -> Router {
    let api = Router::new()
        .route("/availability", get(multiple_availability))
        .route("/availability/all/active", get(active_availability))
        .route("/availability/{event_id}", get(event_availability))
        .route("/bookings", post(create_booking));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .nest("/api/v1", api)
        .with_state(catalog)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    } else {
        app
    }
}

/// Serve `app` on an already bound listener
pub async fn serve(listener: tokio::net::TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app).await
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn stats(State(catalog): State<Arc<Catalog>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "running",
        "service": "ticketwatch-server",
        "version": env!("CARGO_PKG_VERSION"),
        "events": catalog.len().await,
    }))
}

async fn event_availability(
    State(catalog): State<Arc<Catalog>>,
    Path(event_id): Path<EventId>,
) -> ApiResult<AvailabilityRecord> {
    let record = catalog
        .availability(event_id, Utc::now())
        .await
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    Ok(Json(ApiResponse::success(record, "Event availability retrieved successfully")))
}

async fn multiple_availability(
    State(catalog): State<Arc<Catalog>>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<MultipleAvailability> {
    let event_ids = parse_event_ids(&params).map_err(ApiError::BadRequest)?;

    let now = Utc::now();
    let events = catalog.availability_many(&event_ids, now).await;

    Ok(Json(ApiResponse::success(
        MultipleAvailability { events, last_updated: now },
        "Multiple events availability retrieved successfully",
    )))
}

async fn active_availability(State(catalog): State<Arc<Catalog>>) -> ApiResult<MultipleAvailability> {
    let now = Utc::now();
    let events = catalog.active_availability(now).await;

    Ok(Json(ApiResponse::success(
        MultipleAvailability { events, last_updated: now },
        "All active events availability retrieved successfully",
    )))
}

async fn create_booking(
    State(catalog): State<Arc<Catalog>>,
    Json(request): Json<BookingRequest>,
) -> ApiResult<AvailabilityRecord> {
    let record = catalog.book(request.event_id, request.quantity).await?;
    Ok(Json(ApiResponse::success(record, "Booking created successfully")))
}

/// Collect `event_ids` from decoded query pairs.
///
/// Accepts repeated keys (`event_ids=1&event_ids=2`), the `event_ids[]` form,
/// and comma separated values (`event_ids=1,2`).
fn parse_event_ids(params: &[(String, String)]) -> Result<Vec<EventId>, String> {
    let mut event_ids = Vec::new();

    for (key, value) in params {
        if key != "event_ids" && key != "event_ids[]" {
            continue;
        }
        for raw in value.split(',').map(str::trim) {
            if raw.is_empty() {
                continue;
            }
            let id = raw
                .parse::<EventId>()
                .map_err(|_| format!("Invalid event id '{}'", raw))?;
            if !event_ids.contains(&id) {
                event_ids.push(id);
            }
        }
    }

    if event_ids.is_empty() {
        return Err("At least one event_ids value is required".to_string());
    }
    Ok(event_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEvent;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        let catalog = Catalog::new(vec![
            CatalogEvent::new(1, "Opening Night", 1000, 250),
            CatalogEvent::new(2, "Late Show", 100, 100),
        ]);
        build_router(Arc::new(catalog), false)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn query_ids(uri: &str) -> Result<Vec<EventId>, String> {
        let uri: axum::http::Uri = uri.parse().unwrap();
        let Query(params) = Query::<Vec<(String, String)>>::try_from_uri(&uri).unwrap();
        parse_event_ids(&params)
    }

    #[test]
    fn test_parse_event_ids() {
        assert_eq!(query_ids("/a?event_ids=1&event_ids=2"), Ok(vec![1, 2]));
        assert_eq!(query_ids("/a?event_ids=3,4&other=x&event_ids=3"), Ok(vec![3, 4]));
        assert_eq!(query_ids("/a?event_ids%5B%5D=5"), Ok(vec![5]));
        assert!(query_ids("/a?event_ids=abc").is_err());
        assert!(query_ids("/a").is_err());
    }

    #[test]
    fn test_parse_event_ids_percent_encoded() {
        assert_eq!(query_ids("/a?event_ids=%31"), Ok(vec![1]));
        assert_eq!(query_ids("/a?event_ids=1%2c2"), Ok(vec![1, 2]));
        assert_eq!(query_ids("/a?event_ids%5b%5d=5"), Ok(vec![5]));
        assert_eq!(query_ids("/a?event_ids=1,+2"), Ok(vec![1, 2]));
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_single_availability() {
        let (status, body) = send(app(), get("/api/v1/availability/1")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["available_tickets"], 750);
        assert_eq!(body["data"]["occupancy_percentage"], 25.0);
        assert_eq!(body["data"]["event_status"], "active");
    }

    #[tokio::test]
    async fn test_single_availability_not_found() {
        let (status, body) = send(app(), get("/api/v1/availability/77")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Event not found");
    }

    #[tokio::test]
    async fn test_multiple_availability() {
        let (status, body) = send(app(), get("/api/v1/availability?event_ids=1&event_ids=2&event_ids=9")).await;

        assert_eq!(status, StatusCode::OK);
        let events = body["data"]["events"].as_object().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events["2"]["is_sold_out"], true);
        assert!(body["data"]["last_updated"].is_string());
    }

    #[tokio::test]
    async fn test_multiple_availability_percent_encoded() {
        let (status, body) = send(app(), get("/api/v1/availability?event_ids%5B%5D=%31%2C2")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["events"].as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_multiple_availability_requires_ids() {
        let (status, body) = send(app(), get("/api/v1/availability")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_active_availability() {
        let (status, body) = send(app(), get("/api/v1/availability/all/active")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["events"].as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_booking_flow() {
        let app = app();
        let book = |quantity: i64| {
            Request::builder()
                .method("POST")
                .uri("/api/v1/bookings")
                .header("content-type", "application/json")
                .body(Body::from(format!(r#"{{"event_id": 1, "quantity": {}}}"#, quantity)))
                .unwrap()
        };

        let (status, body) = send(app.clone(), book(700)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["available_tickets"], 50);
        assert_eq!(body["data"]["is_almost_sold_out"], true);

        let (status, body) = send(app.clone(), book(51)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, _) = send(app.clone(), book(0)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(app, get("/api/v1/availability/1")).await;
        assert_eq!(body["data"]["booked_tickets"], 950);
    }
}
