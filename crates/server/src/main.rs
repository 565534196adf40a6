// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! HTTP server for the Hemolink donor matching system.
//!
//! Binds the API boundary operations to routes, streams lifecycle events
//! over a read-only WebSocket, and owns process concerns: CLI arguments,
//! logging, storage setup, and engine recovery at startup.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

mod live;

use axum::{
    Json, Router,
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use clap::Parser;
use hemolink::{DonorStore, InventoryFeed, MatchingEngine, NotificationDispatcher};
use hemolink_api::{
    ApiError, CancelRequestPayload, DonorResponsePayload, RegisterDonorPayload,
    SetAvailabilityPayload, SubmitRequestPayload,
};
use hemolink_domain::EscalationPolicy;
use hemolink_persistence::SqliteStore;
use live::{LiveEvent, LiveEventBroadcaster, live_events_handler};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Hemolink server - HTTP server for blood donor matching and escalation.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the `SQLite` database file. If not provided, uses an
    /// in-memory database.
    #[arg(short, long)]
    database: Option<String>,

    /// Port to bind the server to
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    /// The matching engine.
    engine: Arc<MatchingEngine>,
    /// Broadcaster for live lifecycle events.
    broadcaster: Arc<LiveEventBroadcaster>,
}

/// JSON error body returned by every failing route.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps an API error onto an HTTP response.
fn error_response(err: &ApiError) -> Response {
    let status: StatusCode = match err {
        ApiError::InvalidInput { .. } | ApiError::InvalidCsvFormat { .. } => {
            StatusCode::BAD_REQUEST
        }
        ApiError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
        ApiError::DomainRuleViolation { .. } | ApiError::InvalidState { .. } => {
            StatusCode::CONFLICT
        }
        ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(%err, "Request failed");
    } else {
        warn!(%err, "Request rejected");
    }
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn submit_request_handler(
    AxumState(state): AxumState<AppState>,
    Json(payload): Json<SubmitRequestPayload>,
) -> Response {
    match hemolink_api::submit_request(&state.engine, payload).await {
        Ok(response) => {
            state.broadcaster.broadcast(&LiveEvent::RequestSubmitted {
                request_id: response.request_id,
            });
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

async fn request_status_handler(
    AxumState(state): AxumState<AppState>,
    Path(request_id): Path<i64>,
) -> Response {
    match hemolink_api::get_request_status(&state.engine, request_id).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn donor_response_handler(
    AxumState(state): AxumState<AppState>,
    Path(request_id): Path<i64>,
    Json(payload): Json<DonorResponsePayload>,
) -> Response {
    let donor_id: i64 = payload.donor_id;
    match hemolink_api::record_donor_response(&state.engine, request_id, payload).await {
        Ok(ack) => {
            let state_after: String = hemolink_api::get_request_status(&state.engine, request_id)
                .await
                .map_or_else(|_| String::from("unknown"), |status| status.state);
            state.broadcaster.broadcast(&LiveEvent::ResponseRecorded {
                request_id,
                donor_id,
                outcome: ack.outcome.clone(),
                state: state_after,
            });
            Json(ack).into_response()
        }
        Err(err) => error_response(&err),
    }
}

async fn cancel_request_handler(
    AxumState(state): AxumState<AppState>,
    Path(request_id): Path<i64>,
    Json(payload): Json<CancelRequestPayload>,
) -> Response {
    match hemolink_api::cancel_request(&state.engine, request_id, payload).await {
        Ok(()) => {
            state
                .broadcaster
                .broadcast(&LiveEvent::RequestCancelled { request_id });
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => error_response(&err),
    }
}

async fn register_donor_handler(
    AxumState(state): AxumState<AppState>,
    Json(payload): Json<RegisterDonorPayload>,
) -> Response {
    match hemolink_api::register_donor(&state.engine, payload) {
        Ok(response) => {
            state.broadcaster.broadcast(&LiveEvent::DonorRegistered {
                donor_id: response.donor_id,
            });
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

async fn import_donors_handler(
    AxumState(state): AxumState<AppState>,
    body: String,
) -> Response {
    match hemolink_api::import_donor_roster(&state.engine, &body) {
        Ok(report) => {
            for row in &report.rows {
                if let Some(donor_id) = row.donor_id {
                    state
                        .broadcaster
                        .broadcast(&LiveEvent::DonorRegistered { donor_id });
                }
            }
            Json(ImportReportBody::from_report(&report)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

/// Serializable projection of an import report.
#[derive(Debug, Serialize)]
struct ImportReportBody {
    total_rows: usize,
    imported_count: usize,
    rejected_count: usize,
    rows: Vec<ImportRowBody>,
}

#[derive(Debug, Serialize)]
struct ImportRowBody {
    row_number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    donor_id: Option<i64>,
    imported: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl ImportReportBody {
    fn from_report(report: &hemolink_api::ImportReport) -> Self {
        Self {
            total_rows: report.total_rows,
            imported_count: report.imported_count,
            rejected_count: report.rejected_count,
            rows: report
                .rows
                .iter()
                .map(|row| ImportRowBody {
                    row_number: row.row_number,
                    name: row.name.clone(),
                    donor_id: row.donor_id,
                    imported: row.status == hemolink_api::ImportRowStatus::Imported,
                    errors: row.errors.clone(),
                })
                .collect(),
        }
    }
}

async fn donor_availability_handler(
    AxumState(state): AxumState<AppState>,
    Path(donor_id): Path<i64>,
    Json(payload): Json<SetAvailabilityPayload>,
) -> Response {
    match hemolink_api::set_donor_availability(&state.engine, donor_id, &payload) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}

async fn stock_handler(
    AxumState(state): AxumState<AppState>,
    Path(blood_type): Path<String>,
) -> Response {
    match hemolink_api::check_stock(&state.engine, &blood_type) {
        Ok(response) => Json(response).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Builds the application router.
fn build_router(engine: Arc<MatchingEngine>, broadcaster: Arc<LiveEventBroadcaster>) -> Router {
    let state: AppState = AppState {
        engine,
        broadcaster: Arc::clone(&broadcaster),
    };
    let live_router: Router = Router::new()
        .route("/live", get(live_events_handler))
        .with_state(broadcaster);
    Router::new()
        .route("/health", get(health_handler))
        .route("/requests", post(submit_request_handler))
        .route("/requests/{request_id}", get(request_status_handler))
        .route("/requests/{request_id}/respond", post(donor_response_handler))
        .route("/requests/{request_id}/cancel", post(cancel_request_handler))
        .route("/donors", post(register_donor_handler))
        .route("/donors/import", post(import_donors_handler))
        .route(
            "/donors/{donor_id}/availability",
            put(donor_availability_handler),
        )
        .route("/inventory/{blood_type}", get(stock_handler))
        .with_state(state)
        .merge(live_router)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Args = Args::parse();

    let store: Arc<SqliteStore> = Arc::new(match args.database.as_deref() {
        Some(path) => SqliteStore::open(path)?,
        None => {
            warn!("No database path given; using an in-memory database");
            SqliteStore::new_in_memory()?
        }
    });

    let engine: Arc<MatchingEngine> = Arc::new(MatchingEngine::new(
        Arc::clone(&store) as Arc<dyn DonorStore>,
        Arc::new(LoggingDispatcher),
        Some(Arc::clone(&store) as Arc<dyn InventoryFeed>),
        EscalationPolicy::default(),
    ));

    let resumed: usize = engine.recover().await?;
    info!(resumed, "Engine recovery complete");

    let broadcaster: Arc<LiveEventBroadcaster> = Arc::new(LiveEventBroadcaster::new());
    let app: Router = build_router(Arc::clone(&engine), broadcaster);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(port = args.port, "Hemolink server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// A stand-in dispatcher that logs notifications instead of delivering
/// them. Real deployments plug an SMS/email gateway in here.
struct LoggingDispatcher;

impl NotificationDispatcher for LoggingDispatcher {
    fn notify(
        &self,
        donor: &hemolink_domain::Donor,
        summary: &hemolink::RequestSummary,
        channel: hemolink_domain::ContactChannel,
    ) -> Result<hemolink::DeliveryReceipt, hemolink::DispatchError> {
        let donor_id: i64 = donor.donor_id.unwrap_or(-1);
        info!(
            donor_id,
            request_id = summary.request_id,
            %channel,
            blood_type = %summary.blood_type,
            units = summary.units_needed,
            "Dispatching donor notification"
        );
        Ok(hemolink::DeliveryReceipt {
            donor_id,
            channel,
            dispatched_at: time::OffsetDateTime::now_utc(),
        })
    }
}
