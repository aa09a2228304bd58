use crate::store::{ChangeOrigin, ChangeSignal, ContentStore};
use actix_web::{web, HttpResponse, Responder};
use actix_web_lab::sse;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;

const KEEP_ALIVE: Duration = Duration::from_secs(15);
const STREAM_BUFFER: usize = 10;

#[derive(Serialize)]
struct VersionResponse {
    version: i64,
}

pub fn config_changes(cfg: &mut web::ServiceConfig) {
    cfg.route("/changes/version", web::get().to(get_change_version))
        .route("/changes/stream", web::get().to(stream_changes));
}

/// For readers that poll: re-fetch whenever the number moves.
async fn get_change_version(store: web::Data<ContentStore>) -> impl Responder {
    HttpResponse::Ok().json(VersionResponse {
        version: store.version(),
    })
}

/// One `change` event per store signal. A `ready` event with the current
/// version opens the stream.
async fn stream_changes(store: web::Data<ContentStore>) -> impl Responder {
    let (sender, receiver) = mpsc::channel::<sse::Event>(STREAM_BUFFER);
    let mut subscription = store.subscribe();
    let opening = ChangeSignal {
        version: store.version(),
        origin: ChangeOrigin::Local,
    };

    actix_web::rt::spawn(async move {
        if sender.send(event("ready", &opening)).await.is_err() {
            return;
        }
        while let Some(signal) = subscription.changed().await {
            if sender.send(event("change", &signal)).await.is_err() {
                log::debug!("Change stream client disconnected.");
                break;
            }
        }
    });

    sse::Sse::from_infallible_receiver(receiver).with_keep_alive(KEEP_ALIVE)
}

fn event(name: &'static str, signal: &ChangeSignal) -> sse::Event {
    let payload = serde_json::to_string(signal).unwrap_or_else(|e| {
        log::error!("Failed to serialise change signal: {}", e);
        format!("{{\"version\":{}}}", signal.version)
    });
    sse::Data::new(payload).event(name).into()
}
