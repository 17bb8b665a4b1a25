use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::domain::{
    ApplicationId, DocumentDecision, DocumentId, DocumentKind, ShiftDefinition, ShiftId,
    TimesheetDecision, TimesheetEntry, TimesheetId, WorkerId,
};
use super::lifecycle::WorkerAction;
use super::repository::{NotificationPublisher, RepositoryError, StaffingRepository};
use super::service::{StaffingError, StaffingService};
use super::verification::VerificationService;

/// Shared handler state: both services over the same store.
pub struct StaffingApi<R, N> {
    pub staffing: Arc<StaffingService<R, N>>,
    pub verification: Arc<VerificationService<R, N>>,
}

impl<R, N> Clone for StaffingApi<R, N> {
    fn clone(&self) -> Self {
        Self {
            staffing: Arc::clone(&self.staffing),
            verification: Arc::clone(&self.verification),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub worker_id: WorkerId,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTimesheetRequest {
    pub worker_id: WorkerId,
    #[serde(flatten)]
    pub entry: TimesheetEntry,
}

#[derive(Debug, Deserialize)]
pub struct ReviewTimesheetRequest {
    pub decision: TimesheetDecision,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaidRequest {
    pub payout_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct WorkerDecisionRequest {
    pub action: WorkerAction,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadDocumentRequest {
    pub kind: DocumentKind,
}

/// Router builder exposing every staffing and verification operation.
pub fn staffing_router<R, N>(api: StaffingApi<R, N>) -> Router
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/shifts", post(create_shift_handler::<R, N>))
        .route("/api/v1/shifts/quote", post(quote_shift_handler::<R, N>))
        .route(
            "/api/v1/shifts/complete-elapsed",
            post(complete_elapsed_handler::<R, N>),
        )
        .route("/api/v1/shifts/:shift_id", get(shift_handler::<R, N>))
        .route(
            "/api/v1/shifts/:shift_id/publish",
            post(publish_shift_handler::<R, N>),
        )
        .route(
            "/api/v1/shifts/:shift_id/cancel",
            post(cancel_shift_handler::<R, N>),
        )
        .route(
            "/api/v1/shifts/:shift_id/complete",
            post(complete_shift_handler::<R, N>),
        )
        .route(
            "/api/v1/shifts/:shift_id/applications",
            get(shift_applications_handler::<R, N>).post(apply_handler::<R, N>),
        )
        .route(
            "/api/v1/shifts/:shift_id/timesheets",
            post(create_timesheet_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/accept",
            post(accept_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/reject",
            post(reject_handler::<R, N>),
        )
        .route(
            "/api/v1/applications/:application_id/withdraw",
            post(withdraw_handler::<R, N>),
        )
        .route(
            "/api/v1/timesheets/:timesheet_id",
            get(timesheet_handler::<R, N>).put(update_timesheet_handler::<R, N>),
        )
        .route(
            "/api/v1/timesheets/:timesheet_id/submit",
            post(submit_timesheet_handler::<R, N>),
        )
        .route(
            "/api/v1/timesheets/:timesheet_id/review",
            post(review_timesheet_handler::<R, N>),
        )
        .route(
            "/api/v1/timesheets/:timesheet_id/paid",
            post(paid_timesheet_handler::<R, N>),
        )
        .route(
            "/api/v1/workers/:worker_id",
            get(worker_handler::<R, N>).post(register_worker_handler::<R, N>),
        )
        .route(
            "/api/v1/workers/:worker_id/decision",
            post(decide_worker_handler::<R, N>),
        )
        .route(
            "/api/v1/workers/:worker_id/documents",
            post(upload_document_handler::<R, N>),
        )
        .route(
            "/api/v1/workers/:worker_id/documents/summary",
            get(document_summary_handler::<R, N>),
        )
        .route(
            "/api/v1/documents/:document_id/replace",
            post(replace_document_handler::<R, N>),
        )
        .route(
            "/api/v1/documents/:document_id/review",
            post(review_document_handler::<R, N>),
        )
        .with_state(api)
}

/// HTTP status for a service error.
pub fn status_for(error: &StaffingError) -> StatusCode {
    match error {
        StaffingError::InvalidSchedule(_)
        | StaffingError::InvalidDuration(_)
        | StaffingError::MissingNote { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StaffingError::InvalidTransition { .. }
        | StaffingError::IncompleteShift { .. }
        | StaffingError::CapacityExceeded { .. }
        | StaffingError::DuplicateApplication { .. }
        | StaffingError::Storage(RepositoryError::VersionConflict { .. })
        | StaffingError::Storage(RepositoryError::UniqueViolation { .. }) => StatusCode::CONFLICT,
        StaffingError::NotApproved { .. } | StaffingError::NotEligible { .. } => {
            StatusCode::FORBIDDEN
        }
        StaffingError::NotFound { .. } => StatusCode::NOT_FOUND,
        error if error.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        StaffingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `{ "error": code, "message": text }` with the mapped status.
pub fn error_response(error: &StaffingError) -> Response {
    let status = status_for(error);
    if status.is_server_error() {
        warn!(error = %error, code = error.code(), "staffing request failed");
    }
    let payload = json!({
        "error": error.code(),
        "message": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

/// Runs a service call on the blocking pool; store locks may wait up to the storage timeout.
async fn respond<T, F>(status: StatusCode, call: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> Result<T, StaffingError> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(Ok(value)) => (status, Json(value)).into_response(),
        Ok(Err(error)) => error_response(&error),
        Err(join_error) => {
            warn!(error = %join_error, "staffing task did not complete");
            let payload = json!({
                "error": "internal",
                "message": "staffing request did not complete",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn create_shift_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Json(definition): Json<ShiftDefinition>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::CREATED, move || api.staffing.create_shift(definition)).await
}

pub(crate) async fn quote_shift_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Json(definition): Json<ShiftDefinition>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.quote(&definition)).await
}

pub(crate) async fn complete_elapsed_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.complete_elapsed_shifts()).await
}

pub(crate) async fn shift_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(shift_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.shift(&ShiftId(shift_id))).await
}

pub(crate) async fn publish_shift_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(shift_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.publish_shift(&ShiftId(shift_id))).await
}

pub(crate) async fn cancel_shift_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(shift_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.cancel_shift(&ShiftId(shift_id))).await
}

pub(crate) async fn complete_shift_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(shift_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.complete_shift(&ShiftId(shift_id))).await
}

pub(crate) async fn shift_applications_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(shift_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.applications_for_shift(&ShiftId(shift_id))).await
}

pub(crate) async fn apply_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(shift_id): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::CREATED, move || {
        api.staffing
            .apply_to_shift(&ShiftId(shift_id), &request.worker_id, request.message)
    })
    .await
}

pub(crate) async fn create_timesheet_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(shift_id): Path<String>,
    Json(request): Json<CreateTimesheetRequest>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::CREATED, move || {
        api.staffing
            .create_timesheet(&ShiftId(shift_id), &request.worker_id, request.entry)
    })
    .await
}

pub(crate) async fn application_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.application(&ApplicationId(application_id))).await
}

pub(crate) async fn accept_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || {
        api.staffing
            .accept_application(&ApplicationId(application_id))
    })
    .await
}

pub(crate) async fn reject_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(application_id): Path<String>,
    Json(request): Json<RejectRequest>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || {
        api.staffing
            .reject_application(&ApplicationId(application_id), &request.reason)
    })
    .await
}

pub(crate) async fn withdraw_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || {
        api.staffing
            .withdraw_application(&ApplicationId(application_id))
    })
    .await
}

pub(crate) async fn timesheet_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(timesheet_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.timesheet(&TimesheetId(timesheet_id))).await
}

pub(crate) async fn update_timesheet_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(timesheet_id): Path<String>,
    Json(entry): Json<TimesheetEntry>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || {
        api.staffing
            .update_timesheet(&TimesheetId(timesheet_id), entry)
    })
    .await
}

pub(crate) async fn submit_timesheet_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(timesheet_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.staffing.submit_timesheet(&TimesheetId(timesheet_id))).await
}

pub(crate) async fn review_timesheet_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(timesheet_id): Path<String>,
    Json(request): Json<ReviewTimesheetRequest>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || {
        api.staffing.review_timesheet(
            &TimesheetId(timesheet_id),
            request.decision,
            request.note.as_deref(),
        )
    })
    .await
}

pub(crate) async fn paid_timesheet_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(timesheet_id): Path<String>,
    Json(request): Json<PaidRequest>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || {
        api.staffing
            .mark_timesheet_paid(&TimesheetId(timesheet_id), &request.payout_reference)
    })
    .await
}

pub(crate) async fn register_worker_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(worker_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.verification.register_worker(&WorkerId(worker_id))).await
}

pub(crate) async fn worker_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(worker_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.verification.worker_approval(&WorkerId(worker_id))).await
}

pub(crate) async fn decide_worker_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(worker_id): Path<String>,
    Json(request): Json<WorkerDecisionRequest>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || {
        api.verification.decide_worker(
            &WorkerId(worker_id),
            request.action,
            &request.actor,
            request.reason.as_deref(),
        )
    })
    .await
}

pub(crate) async fn upload_document_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(worker_id): Path<String>,
    Json(request): Json<UploadDocumentRequest>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::CREATED, move || {
        api.verification
            .upload_document(&WorkerId(worker_id), request.kind)
    })
    .await
}

pub(crate) async fn document_summary_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(worker_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || api.verification.document_summary(&WorkerId(worker_id))).await
}

pub(crate) async fn replace_document_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(document_id): Path<String>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || {
        api.verification.replace_document(&DocumentId(document_id))
    })
    .await
}

pub(crate) async fn review_document_handler<R, N>(
    State(api): State<StaffingApi<R, N>>,
    Path(document_id): Path<String>,
    Json(decision): Json<DocumentDecision>,
) -> Response
where
    R: StaffingRepository + 'static,
    N: NotificationPublisher + 'static,
{
    respond(StatusCode::OK, move || {
        api.verification
            .review_document(&DocumentId(document_id), decision)
    })
    .await
}
