//! REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};

use super::types::{
    ClearSessionResponse, ErrorResponse, HistoryResponse, QrParams, QrResponse, RefreshResponse,
    ReminderRequest, ReminderResponse, SendMessageRequest, UpdateStatusRequest,
};
use crate::error::{SendFailure, WaSenderError};
use crate::session::{PhoneNumber, SendReceipt, SessionManager, SessionStatus};
use crate::store::{Delivery, HistoryQuery, MessageRecord, MessageStatus, MessageStore};
use crate::template::ReminderTemplate;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionManager,
    pub messages: Arc<MessageStore>,
    pub template: Arc<ReminderTemplate>,
}

impl AppState {
    pub fn new(session: SessionManager) -> Self {
        Self {
            session,
            messages: Arc::new(MessageStore::new()),
            template: Arc::new(ReminderTemplate::default()),
        }
    }

    pub fn with_template(mut self, template: ReminderTemplate) -> Self {
        self.template = Arc::new(template);
        self
    }
}

/// Map a crate error onto an HTTP error response.
pub fn api_error(err: WaSenderError) -> ApiError {
    match err {
        WaSenderError::NotReady => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::not_ready()),
        ),
        WaSenderError::Send { reason, message } => {
            let status = match reason {
                SendFailure::InvalidFormat => StatusCode::BAD_REQUEST,
                SendFailure::NotWhatsappUser => StatusCode::UNPROCESSABLE_ENTITY,
                SendFailure::Unknown => StatusCode::BAD_GATEWAY,
            };
            (status, Json(ErrorResponse::send_failed(reason, message)))
        }
        WaSenderError::Validation(message) => {
            (StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(message)))
        }
        WaSenderError::MessageNotFound(id) => {
            (StatusCode::NOT_FOUND, Json(ErrorResponse::message_not_found(id)))
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal_error(other.to_string())),
        ),
    }
}

/// Send through the session and log the outcome.
///
/// Classified send failures are logged as `failed` before being returned.
async fn deliver(
    state: &AppState,
    delivery: Delivery,
) -> Result<(SendReceipt, MessageRecord), WaSenderError> {
    match state.session.send_message(&delivery.to, &delivery.text).await {
        Ok(receipt) => {
            let delivery = Delivery {
                to: receipt.normalized_to.clone(),
                ..delivery
            };
            let record = state.messages.log_sent(delivery, &receipt.message_id)?;
            Ok((receipt, record))
        }
        Err(WaSenderError::Send { reason, message }) => {
            let to = PhoneNumber::normalize(&delivery.to)
                .map(PhoneNumber::into_string)
                .unwrap_or_else(|_| delivery.to.clone());
            let delivery = Delivery { to, ..delivery };
            if let Err(e) = state.messages.log_failed(delivery, reason.as_str()) {
                warn!(error = %e, "failed to log failed message");
            }
            Err(WaSenderError::Send { reason, message })
        }
        Err(err) => Err(err),
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "wa-sender",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// WhatsApp session status.
pub async fn whatsapp_status(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.session.status())
}

/// Current QR code, or trigger a refresh.
pub async fn whatsapp_qr(
    State(state): State<AppState>,
    Query(params): Query<QrParams>,
) -> Response {
    if params.refresh() || params.hard_reset() {
        let hard_reset = params.hard_reset();
        info!(hard_reset, "QR refresh requested");
        state.session.force_refresh(hard_reset);
        return Json(RefreshResponse::initiated(hard_reset)).into_response();
    }

    if state.session.start_once() {
        info!("first QR request, starting WhatsApp initialization");
    }

    let status = state.session.status();
    let qr = state.session.qr_code();
    let message = match (&qr, status.ready) {
        (None, false) => Some(
            "QR code not available yet. Please try again in a few seconds.".to_string(),
        ),
        _ => None,
    };

    (
        [
            (
                header::CACHE_CONTROL,
                "no-store, no-cache, must-revalidate, proxy-revalidate",
            ),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Json(QrResponse {
            success: qr.is_some(),
            qr,
            ready: status.ready,
            initializing: status.initializing,
            message,
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

/// Send a free-form message.
pub async fn whatsapp_send(
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendReceipt>, ApiError> {
    if req.to.trim().is_empty() || req.message.trim().is_empty() {
        return Err(api_error(WaSenderError::Validation(
            "'to' and 'message' are required".to_string(),
        )));
    }

    let (receipt, _) = deliver(&state, Delivery::new(req.to, req.message))
        .await
        .map_err(api_error)?;
    Ok(Json(receipt))
}

/// Wipe the session profile.
pub async fn whatsapp_clear_session(State(state): State<AppState>) -> Json<ClearSessionResponse> {
    let success = match state.session.clear_session().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "clear session failed");
            false
        }
    };
    Json(ClearSessionResponse { success })
}

/// Render and send a debt reminder.
pub async fn send_reminder(
    State(state): State<AppState>,
    Json(req): Json<ReminderRequest>,
) -> Result<(StatusCode, Json<ReminderResponse>), ApiError> {
    let customer = req
        .into_customer()
        .map_err(|e| api_error(WaSenderError::Validation(e)))?;

    let text = state.template.render(&customer);
    let delivery = Delivery::new(customer.phone_number.clone(), text).for_customer(customer);

    let (_, record) = deliver(&state, delivery).await.map_err(api_error)?;

    Ok((
        StatusCode::CREATED,
        Json(ReminderResponse {
            success: true,
            message: "Message sent".to_string(),
            data: record,
        }),
    ))
}

/// List message history.
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let page = state.messages.query(&query).map_err(api_error)?;
    Ok(Json(HistoryResponse {
        success: true,
        page,
    }))
}

/// Get one history record.
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<MessageRecord>, ApiError> {
    state
        .messages
        .get(id)
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| api_error(WaSenderError::MessageNotFound(id)))
}

/// Update a history record's status.
pub async fn update_history(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<MessageRecord>, ApiError> {
    let status: MessageStatus = req
        .status
        .parse()
        .map_err(|e: String| api_error(WaSenderError::Validation(e)))?;

    let record = state
        .messages
        .update_status(id, status, req.reply)
        .map_err(api_error)?;
    Ok(Json(record))
}
