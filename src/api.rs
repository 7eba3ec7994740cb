use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{bearer_token, Role, TokenMap};
use crate::engine::{rules, Engine, EngineError};
use crate::limits::MAX_PARTY_SIZE;
use crate::model::*;
use crate::observability;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub tokens: Arc<TokenMap>,
}

/// Machine-readable error surface: every failure is `{code, message}` with a
/// 4xx/5xx status. None of these are retried by clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
    },
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("admin role required")]
    Forbidden,
    #[error("unknown excursion: {0}")]
    UnknownExcursion(String),
    #[error("no capacity record for {excursion_id} on {date}")]
    NoSuchDay {
        excursion_id: String,
        date: NaiveDate,
    },
    #[error("day {date} is closed to bookings")]
    DayClosed { date: NaiveDate },
    #[error("sold out on {date}: {requested} requested, {left} left")]
    SoldOut {
        date: NaiveDate,
        requested: u32,
        left: u32,
    },
    #[error("excursion already registered: {0}")]
    AlreadyRegistered(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::UnknownExcursion(_) | Self::NoSuchDay { .. } => StatusCode::NOT_FOUND,
            Self::DayClosed { .. } | Self::SoldOut { .. } | Self::AlreadyRegistered(_) => {
                StatusCode::CONFLICT
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } => code,
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::UnknownExcursion(_) => "unknown_excursion",
            Self::NoSuchDay { .. } => "no_such_day",
            Self::DayClosed { .. } => "day_closed",
            Self::SoldOut { .. } => "sold_out",
            Self::AlreadyRegistered(_) => "already_registered",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "code": self.code(), "message": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::UnknownExcursion(id) => Self::UnknownExcursion(id),
            EngineError::AlreadyRegistered(id) => Self::AlreadyRegistered(id),
            EngineError::NoSuchDay { excursion_id, date } => {
                Self::NoSuchDay { excursion_id, date }
            }
            EngineError::DayClosed { date } => Self::DayClosed { date },
            EngineError::SoldOut {
                date,
                requested,
                left,
            } => Self::SoldOut {
                date,
                requested,
                left,
            },
            EngineError::Invalid(msg) => Self::Validation {
                code: "invalid_request",
                message: msg.to_string(),
            },
            EngineError::LimitExceeded(msg) => Self::Validation {
                code: "limit_exceeded",
                message: msg.to_string(),
            },
            EngineError::WalError(e) => Self::Internal(e),
        }
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ApiError> {
    value.parse().map_err(|_| ApiError::Validation {
        code: "invalid_date",
        message: format!("{field} must be an ISO calendar date, got {value:?}"),
    })
}

fn parse_party(people_count: Option<u32>) -> Result<u32, ApiError> {
    let party = people_count.unwrap_or(1);
    if party == 0 || party > MAX_PARTY_SIZE {
        return Err(ApiError::Validation {
            code: "invalid_people_count",
            message: format!("people_count must be between 1 and {MAX_PARTY_SIZE}"),
        });
    }
    Ok(party)
}

fn require_role(state: &AppState, headers: &HeaderMap, allowed: &[Role]) -> Result<Role, ApiError> {
    let Some(token) = bearer_token(headers) else {
        metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
        return Err(ApiError::Unauthorized);
    };
    let Some(role) = state.tokens.role_for(token) else {
        metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
        return Err(ApiError::Unauthorized);
    };
    if !allowed.contains(&role) {
        metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
        return Err(ApiError::Forbidden);
    }
    Ok(role)
}

fn observe(route: &'static str, started: Instant) {
    metrics::counter!(observability::REQUESTS_TOTAL, "route" => route).increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "route" => route)
        .record(started.elapsed().as_secs_f64());
}

// ── Capacity ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CheckParams {
    excursion_id: String,
    date: String,
    people_count: Option<u32>,
    /// Optional departure time (`HH:MM`), validated against configured slots.
    time: Option<String>,
}

async fn check_capacity(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> Result<Json<CapacityDecision>, ApiError> {
    let started = Instant::now();
    let date = parse_date("date", &params.date)?;
    let party = parse_party(params.people_count)?;
    let time = match params.time.as_deref() {
        Some(s) => Some(rules::parse_time(s).ok_or(ApiError::Validation {
            code: "invalid_time",
            message: format!("time must be HH:MM, got {s:?}"),
        })?),
        None => None,
    };

    let decision = state.engine.check(&params.excursion_id, date, party, time).await;
    observe("check", started);
    Ok(Json(decision))
}

#[derive(Deserialize)]
struct BulkBody {
    excursion_id: String,
    start_date: String,
    end_date: String,
    max_capacity: u32,
    is_available: bool,
}

async fn bulk_open(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BulkBody>,
) -> Result<Json<BulkOutcome>, ApiError> {
    let started = Instant::now();
    require_role(&state, &headers, &[Role::Admin])?;
    let start = parse_date("start_date", &body.start_date)?;
    let end = parse_date("end_date", &body.end_date)?;

    let outcome = state
        .engine
        .bulk_open(&body.excursion_id, start, end, body.max_capacity, body.is_available)
        .await?;
    observe("bulk", started);
    Ok(Json(outcome))
}

#[derive(Deserialize)]
struct SeatsBody {
    excursion_id: String,
    date: String,
    seats: u32,
}

/// Reserve/release response. `booked`/`availableSpots` are None when no
/// capacity record exists (unlimited, accepted no-op).
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SeatsResponse {
    booked: Option<u32>,
    available_spots: Option<i64>,
    has_capacity_limit: bool,
}

impl From<Option<DayRecord>> for SeatsResponse {
    fn from(record: Option<DayRecord>) -> Self {
        match record {
            Some(r) => Self {
                booked: Some(r.booked),
                available_spots: Some(r.available_spots),
                has_capacity_limit: true,
            },
            None => Self {
                booked: None,
                available_spots: None,
                has_capacity_limit: false,
            },
        }
    }
}

async fn reserve_seats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SeatsBody>,
) -> Result<Json<SeatsResponse>, ApiError> {
    let started = Instant::now();
    require_role(&state, &headers, &[Role::Admin, Role::Staff])?;
    let date = parse_date("date", &body.date)?;

    let record = state.engine.reserve(&body.excursion_id, date, body.seats).await?;
    observe("reserve", started);
    Ok(Json(record.into()))
}

async fn release_seats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SeatsBody>,
) -> Result<Json<SeatsResponse>, ApiError> {
    let started = Instant::now();
    require_role(&state, &headers, &[Role::Admin, Role::Staff])?;
    let date = parse_date("date", &body.date)?;

    let record = state.engine.release(&body.excursion_id, date, body.seats).await?;
    observe("release", started);
    Ok(Json(record.into()))
}

#[derive(Deserialize)]
struct DayBody {
    excursion_id: String,
    date: String,
    max_capacity: u32,
    is_available: bool,
}

async fn set_day(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DayBody>,
) -> Result<Json<DayRecord>, ApiError> {
    let started = Instant::now();
    require_role(&state, &headers, &[Role::Admin])?;
    let date = parse_date("date", &body.date)?;

    let record = state
        .engine
        .set_day(&body.excursion_id, date, body.max_capacity, body.is_available)
        .await?;
    observe("set_day", started);
    Ok(Json(record))
}

#[derive(Deserialize)]
struct ReportParams {
    excursion_id: String,
    start_date: String,
    end_date: String,
}

async fn day_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<DayRecord>>, ApiError> {
    let started = Instant::now();
    require_role(&state, &headers, &[Role::Admin])?;
    let start = parse_date("start_date", &params.start_date)?;
    let end = parse_date("end_date", &params.end_date)?;

    let rows = state.engine.day_report(&params.excursion_id, start, end).await?;
    observe("report", started);
    Ok(Json(rows))
}

// ── Excursion registry ──────────────────────────────────────────

async fn register_excursion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(config): Json<ExcursionConfig>,
) -> Result<(StatusCode, Json<ExcursionConfig>), ApiError> {
    let started = Instant::now();
    require_role(&state, &headers, &[Role::Admin])?;
    state.engine.register_excursion(config.clone()).await?;
    observe("register_excursion", started);
    Ok((StatusCode::CREATED, Json(config)))
}

#[derive(Deserialize)]
struct UpdateExcursionBody {
    #[serde(default)]
    name: Option<LocalizedText>,
    #[serde(default)]
    available_days: DaySelection,
    #[serde(default)]
    time_slots: Vec<TimeSlot>,
}

async fn update_excursion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateExcursionBody>,
) -> Result<Json<ExcursionConfig>, ApiError> {
    let started = Instant::now();
    require_role(&state, &headers, &[Role::Admin])?;
    let config = ExcursionConfig {
        id,
        name: body.name,
        available_days: body.available_days,
        time_slots: body.time_slots,
    };
    state.engine.update_excursion(config.clone()).await?;
    observe("update_excursion", started);
    Ok(Json(config))
}

async fn remove_excursion(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let started = Instant::now();
    require_role(&state, &headers, &[Role::Admin])?;
    state.engine.remove_excursion(&id).await?;
    observe("remove_excursion", started);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_excursions(State(state): State<AppState>) -> Json<Vec<ExcursionConfig>> {
    Json(state.engine.list_excursions())
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/capacity/check", get(check_capacity))
        .route("/api/capacity/bulk", post(bulk_open))
        .route("/api/capacity/reserve", post(reserve_seats))
        .route("/api/capacity/release", post(release_seats))
        .route("/api/capacity/day", put(set_day))
        .route("/api/capacity/report", get(day_report))
        .route("/api/excursions", post(register_excursion).get(list_excursions))
        .route(
            "/api/excursions/{id}",
            put(update_excursion).delete(remove_excursion),
        )
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_statuses() {
        let cases: Vec<(EngineError, StatusCode, &str)> = vec![
            (
                EngineError::UnknownExcursion("x".into()),
                StatusCode::NOT_FOUND,
                "unknown_excursion",
            ),
            (
                EngineError::SoldOut {
                    date: "2026-09-01".parse().unwrap(),
                    requested: 2,
                    left: 1,
                },
                StatusCode::CONFLICT,
                "sold_out",
            ),
            (
                EngineError::DayClosed {
                    date: "2026-09-01".parse().unwrap(),
                },
                StatusCode::CONFLICT,
                "day_closed",
            ),
            (
                EngineError::Invalid("end date before start date"),
                StatusCode::BAD_REQUEST,
                "invalid_request",
            ),
            (
                EngineError::LimitExceeded("date range too wide"),
                StatusCode::BAD_REQUEST,
                "limit_exceeded",
            ),
            (
                EngineError::WalError("disk full".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];
        for (engine_err, status, code) in cases {
            let api_err = ApiError::from(engine_err);
            assert_eq!(api_err.status(), status);
            assert_eq!(api_err.code(), code);
        }
    }

    #[test]
    fn date_parsing_codes() {
        assert!(parse_date("date", "2026-02-29").is_err()); // not a leap year
        assert!(parse_date("date", "tomorrow").is_err());
        assert_eq!(
            parse_date("date", "2028-02-29").unwrap(),
            "2028-02-29".parse::<NaiveDate>().unwrap()
        );
        let err = parse_date("start_date", "nope").unwrap_err();
        assert_eq!(err.code(), "invalid_date");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn party_bounds() {
        assert_eq!(parse_party(None).unwrap(), 1);
        assert_eq!(parse_party(Some(4)).unwrap(), 4);
        assert!(parse_party(Some(0)).is_err());
        assert!(parse_party(Some(MAX_PARTY_SIZE + 1)).is_err());
    }
}
