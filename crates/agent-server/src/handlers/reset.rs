use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub session_id: String,
}

#[derive(Serialize)]
struct ResetResponse {
    success: bool,
    message: String,
}

/// `POST /reset`: drop a session's history, keeping its system message.
pub async fn handler(state: web::Data<AppState>, req: web::Json<ResetRequest>) -> impl Responder {
    let session_id = &req.session_id;

    if state.reset_session(session_id).await {
        log::info!("[{}] Conversation reset", session_id);
        HttpResponse::Ok().json(ResetResponse {
            success: true,
            message: "Conversation reset".to_string(),
        })
    } else {
        log::warn!("[{}] Reset requested for unknown session", session_id);
        HttpResponse::NotFound().json(ResetResponse {
            success: false,
            message: "Session not found".to_string(),
        })
    }
}
