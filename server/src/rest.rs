//! HTTP routes for actix-web.

use crate::manager::RoomManager;
use crate::ws;
use actix_web::{web, HttpResponse};
use room_relay_protocol::ResolveRoomRequest;
use serde::Serialize;
use std::sync::Arc;

/// Shared application state for HTTP handlers.
pub struct AppState {
    pub manager: Arc<RoomManager>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Register every route on an app or scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api", web::route().to(resolve_room))
        .route("/websocket", web::route().to(ws::websocket))
        .default_service(web::route().to(greet));
}

/// `/api` - resolve (and start) the room for a code. Empty 200 on success.
pub async fn resolve_room(body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    let request: ResolveRoomRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: format!("Invalid request body: {}", e),
            });
        }
    };

    let room = state.manager.resolve(&request.room_code);
    tracing::debug!(
        "Resolved room {} ({} connection(s))",
        room.code(),
        room.connection_count()
    );
    HttpResponse::Ok().finish()
}

/// Anything else.
pub async fn greet() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Hello, world!")
}
