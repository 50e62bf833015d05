//! Websocket endpoint for live counter updates
//!
//! Clients open `GET /ws/content/{content_type}/{content_id}` and receive
//! every counter delta published for that content item while connected.
//! One connection subscribes to exactly one room.

use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::parse_content_type;
use crate::ws::{room_key, ConnectionRegistry, SubscriberId};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// Counter delta forwarded from the registry to one connection.
#[derive(Clone, Message)]
#[rtype(result = "()")]
struct RoomMessage(String);

/// Actor for a single fan-out subscription.
pub struct CounterFeedActor {
    room: String,
    subscriber_id: SubscriberId,
    registry: ConnectionRegistry,
    receiver: Option<UnboundedReceiver<String>>,
    last_heartbeat: Instant,
}

impl Actor for CounterFeedActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::debug!(room = %self.room, "counter feed session started");

        // Forward registry broadcasts into this actor until either side goes away
        if let Some(mut rx) = self.receiver.take() {
            let addr = ctx.address();
            actix_rt::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    if addr.try_send(RoomMessage(msg)).is_err() {
                        break;
                    }
                }
            });
        }

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                tracing::debug!(room = %act.room, "counter feed client timed out");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::debug!(room = %self.room, "counter feed session stopped");

        let registry = self.registry.clone();
        let room = self.room.clone();
        let subscriber_id = self.subscriber_id;
        actix_rt::spawn(async move {
            registry.unsubscribe(&room, subscriber_id).await;
        });
    }
}

impl Handler<RoomMessage> for CounterFeedActor {
    type Result = ();

    fn handle(&mut self, msg: RoomMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for CounterFeedActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(payload)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&payload);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            // The feed is one-way; inbound text/binary is ignored
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(room = %self.room, error = %err, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// Upgrade handler for the counter feed room.
pub async fn counter_feed_ws(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    payload: web::Payload,
    registry: web::Data<ConnectionRegistry>,
) -> actix_web::Result<HttpResponse> {
    let (content_type, content_id) = path.into_inner();
    let content_type = parse_content_type(&content_type)?;
    let content_id = Uuid::parse_str(&content_id)
        .map_err(|_| AppError::InvalidIdentifier(format!("invalid content id: {content_id}")))?;

    let room = room_key(&content_type, content_id);
    let (subscriber_id, receiver) = registry.subscribe(&room).await;

    let actor = CounterFeedActor {
        room,
        subscriber_id,
        registry: registry.get_ref().clone(),
        receiver: Some(receiver),
        last_heartbeat: Instant::now(),
    };

    ws::start(actor, &req, payload)
}
