//! HTTP handlers for the whitelist API.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use super::api::{
    AddRequest, ApiResponse, AuditQuery, AuditResponse, CheckQuery, CheckResponse, DeleteRequest,
    ImportRequest, StatsResponse, ToggleRequest, UpdateRequest, WhitelistResponse,
};
use super::error::WebError;
use crate::guard::{GuardError, WhitelistGuard};
use crate::whitelist::{ExportDocument, ImportOptions, WhitelistDocument, WhitelistStats};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Guard owning the store and audit log.
    pub guard: WhitelistGuard,
    /// Cancellation token for graceful shutdown.
    pub cancel: CancellationToken,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(guard: WhitelistGuard) -> Self {
        Self {
            guard,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

async fn stats_response(guard: &WhitelistGuard) -> StatsResponse {
    let (stats, ready) = match guard.stats().await {
        Ok(stats) => (stats, true),
        Err(e) => {
            tracing::warn!(error = %e, "Whitelist stats unavailable");
            (WhitelistStats::from(&WhitelistDocument::default()), false)
        }
    };
    StatsResponse {
        stats,
        enforcement_mode: guard.mode(),
        ready,
    }
}

/// GET /api/whitelist - List entries with stats.
pub async fn get_whitelist(
    State(state): State<AppState>,
) -> Result<Json<WhitelistResponse>, WebError> {
    let networks = state.guard.list().await?;
    let stats = stats_response(&state.guard).await;
    Ok(Json(WhitelistResponse { networks, stats }))
}

/// GET /api/stats - Aggregate counts.
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(stats_response(&state.guard).await)
}

/// POST /api/whitelist/add - Add an entry.
pub async fn post_add(
    State(state): State<AppState>,
    Json(request): Json<AddRequest>,
) -> Result<Json<ApiResponse>, WebError> {
    let id = match request.identifier.as_deref().map(str::trim) {
        Some(identifier) if !identifier.is_empty() => {
            state.guard.add_identifier(identifier).await?
        }
        _ => state.guard.add(request.fields).await?,
    };
    Ok(Json(
        ApiResponse::success("Network added successfully").with_id(id),
    ))
}

/// PUT /api/whitelist/update - Update fields of an entry.
pub async fn put_update(
    State(state): State<AppState>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<ApiResponse>, WebError> {
    let updated = state.guard.update(request.id, request.update).await?;
    Ok(Json(
        ApiResponse::success("Network updated successfully").with_id(updated.id),
    ))
}

/// PUT /api/whitelist/toggle - Enable or disable an entry.
pub async fn put_toggle(
    State(state): State<AppState>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<ApiResponse>, WebError> {
    let toggled = state.guard.toggle(request.id, request.enabled).await?;
    let message = if toggled.enabled {
        "Network enabled"
    } else {
        "Network disabled"
    };
    Ok(Json(ApiResponse::success(message).with_id(toggled.id)))
}

/// DELETE /api/whitelist/delete - Remove by id or by BSSID/SSID.
pub async fn delete_entry(
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<ApiResponse>, WebError> {
    match (request.id, request.identifier) {
        (Some(id), _) => {
            state.guard.remove(id).await?;
            Ok(Json(
                ApiResponse::success("Network deleted successfully").with_id(id),
            ))
        }
        (None, Some(identifier)) => {
            let removed = state.guard.remove_identifier(&identifier).await?;
            Ok(Json(ApiResponse::success(format!(
                "Removed {} network(s) matching \"{identifier}\"",
                removed.len()
            ))))
        }
        (None, None) => Err(WebError::BadRequest(
            "either id or entry is required".to_string(),
        )),
    }
}

/// GET /api/whitelist/export - Export the collection.
pub async fn get_export(State(state): State<AppState>) -> Result<Json<ExportDocument>, WebError> {
    Ok(Json(state.guard.export().await?))
}

/// POST /api/whitelist/import - Import a document.
pub async fn post_import(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ApiResponse>, WebError> {
    let document = WhitelistDocument::from_json(&request.data.to_string())
        .map_err(|e| WebError::BadRequest(format!("Invalid import data: {e}")))?;

    let options = ImportOptions {
        mode: request.mode,
        create_backup: request.create_backup,
    };
    let summary = state.guard.import(document, options).await?;
    Ok(Json(ApiResponse::success(format!(
        "Whitelist imported successfully: {} added, {} skipped, {} total",
        summary.imported, summary.skipped, summary.total
    ))))
}

/// GET /api/check - Preview the decision for a target without auditing it.
pub async fn get_check(
    State(state): State<AppState>,
    Query(query): Query<CheckQuery>,
) -> Result<Json<CheckResponse>, WebError> {
    let guard = state.guard.clone();
    let verdict = tokio::task::spawn_blocking(move || guard.evaluate(&query.bssid, &query.ssid))
        .await
        .map_err(|_| GuardError::TaskCancelled)?;
    Ok(Json(CheckResponse::from(verdict)))
}

/// GET /api/audit - Recent audit events with decision counts.
pub async fn get_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, WebError> {
    let events = state
        .guard
        .recent_audit(query.effective_limit(), query.offset)
        .await?;
    let summary = state.guard.audit_summary().await?;
    Ok(Json(AuditResponse { events, summary }))
}

/// GET /api/events - SSE stream of audit events.
///
/// The stream ends immediately when no audit log is attached.
pub async fn get_events_sse(
    State(state): State<AppState>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let rx = match state.guard.audit() {
        Some(audit) => audit.subscribe(),
        None => broadcast::channel(1).1,
    };
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok(Event::default().event(event.event_type.as_str()).data(data)))
            }
            Err(_) => None, // Skip lagged messages
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
