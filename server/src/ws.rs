//! WebSocket transport for room connections.
//!
//! Each WebSocket is an actix actor that forwards inbound frames to its
//! room and writes whatever the room sends back.

use crate::host::RoomHandle;
use crate::registry::Frame;
use crate::rest::AppState;
use actix::{Actor, ActorContext, AsyncContext, Handler, Message, StreamHandler};
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use room_relay_protocol::{ConnectionId, RoomCode};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Close code reported to the room when the transport drops without a
/// close handshake.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when the client's close frame carried no status.
const NO_STATUS: u16 = 1005;

/// WebSocket actor for one room connection.
pub struct RelayWsActor {
    connection: ConnectionId,
    room: RoomHandle,
    /// Frames from the room, taken when the actor starts.
    outbound: Option<mpsc::UnboundedReceiver<Frame>>,
    /// Set once the room knows this connection is closing.
    closed: bool,
    last_heartbeat: Instant,
}

/// A frame from the room, to be written to the socket.
#[derive(Message)]
#[rtype(result = "()")]
pub struct RoomFrame(pub Frame);

/// The room dropped this connection's outbound channel.
#[derive(Message)]
#[rtype(result = "()")]
pub struct RoomDetached;

impl RelayWsActor {
    pub fn new(
        connection: ConnectionId,
        room: RoomHandle,
        outbound: mpsc::UnboundedReceiver<Frame>,
    ) -> Self {
        Self {
            connection,
            room,
            outbound: Some(outbound),
            closed: false,
            last_heartbeat: Instant::now(),
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                tracing::debug!("{} heartbeat timeout", act.connection);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn start_listener(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some(mut outbound) = self.outbound.take() {
            let addr = ctx.address();
            actix::spawn(async move {
                while let Some(frame) = outbound.recv().await {
                    if addr.try_send(RoomFrame(frame)).is_err() {
                        return;
                    }
                }
                let _ = addr.try_send(RoomDetached);
            });
        }
    }

    /// Tell the room this connection is closing. Returns false if the room
    /// could not be reached.
    fn forward_close(&mut self, code: u16, reason: String, was_clean: bool) -> bool {
        if self.closed {
            return true;
        }
        self.closed = true;
        match self.room.close(self.connection, code, reason, was_clean) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("{} close not delivered: {}", self.connection, e);
                false
            }
        }
    }

    fn forward_text(&self, text: String) {
        if let Err(e) = self.room.message(self.connection, text) {
            tracing::warn!("{} message not delivered: {}", self.connection, e);
        }
    }
}

impl Actor for RelayWsActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);
        self.start_listener(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.forward_close(ABNORMAL_CLOSURE, String::new(), false);
    }
}

impl Handler<RoomFrame> for RelayWsActor {
    type Result = ();

    fn handle(&mut self, msg: RoomFrame, ctx: &mut Self::Context) {
        match msg.0 {
            Frame::Text(text) => ctx.text(text),
            Frame::Close { code, reason } => {
                self.closed = true;
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::from(code),
                    description: Some(reason),
                }));
                ctx.stop();
            }
        }
    }
}

impl Handler<RoomDetached> for RelayWsActor {
    type Result = ();

    fn handle(&mut self, _msg: RoomDetached, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelayWsActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.forward_text(text.to_string());
            }
            Ok(ws::Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => self.forward_text(text),
                Err(_) => tracing::debug!("{} sent non UTF-8 binary frame, ignoring", self.connection),
            },
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!("{} close: {:?}", self.connection, reason);
                let (code, description) = reason
                    .map(|r| (u16::from(r.code), r.description.unwrap_or_default()))
                    .unwrap_or((NO_STATUS, String::new()));
                // The room answers with its own close frame; stop only if it
                // is unreachable.
                if !self.forward_close(code, description, true) {
                    ctx.stop();
                }
            }
            Err(e) => {
                tracing::debug!("{} protocol error: {}", self.connection, e);
                ctx.stop();
            }
            _ => (),
        }
    }
}

#[derive(serde::Deserialize)]
pub struct WsQuery {
    #[serde(rename = "roomCode", default)]
    pub room_code: RoomCode,
}

fn is_websocket_upgrade(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// `/websocket?roomCode=...` - upgrade to a room connection.
pub async fn websocket(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    if !is_websocket_upgrade(&req) {
        return Ok(HttpResponse::build(StatusCode::UPGRADE_REQUIRED)
            .content_type("text/plain; charset=utf-8")
            .body("Expected Upgrade: websocket"));
    }
    ws::handshake(&req)?;

    let code = query.into_inner().room_code;
    let room = state.manager.resolve(&code);
    let connection = state.manager.next_connection_id();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    room.connect(connection, outbound_tx)
        .map_err(actix_web::error::ErrorServiceUnavailable)?;

    tracing::info!("WebSocket {} joined room {}", connection, code);

    ws::start(RelayWsActor::new(connection, room, outbound_rx), &req, stream)
}
