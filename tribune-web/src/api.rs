use std::rc::Rc;

use async_trait::async_trait;
use chrono::Utc;
use futures::{channel::oneshot, pin_mut, select, FutureExt, SinkExt, StreamExt};
use tribune_client::{
    api::{FeedEvent, Time, Uuid, WS_AUTH_OK, WS_PING, WS_PONG},
    ApiClient, Backend, HttpRequest, HttpResponse, TransportError,
};
use ws_stream_wasm::{WsMessage, WsMeta};

use crate::ui;

// Pings are sent every PING_INTERVAL
const PING_INTERVAL_SECS: i64 = 10;
// If the interval between two pongs is more than DISCONNECT_INTERVAL, disconnect
const DISCONNECT_INTERVAL_SECS: i64 = 20;
// Space each reconnect attempt by ATTEMPT_SPACING
const ATTEMPT_SPACING_SECS: i64 = 1;
// Give up on the feed after this many consecutive failed connections
const MAX_FAILED_ATTEMPTS: u32 = 5;
// reqwest's own timeout support is unavailable on wasm, so requests are
// raced against a wasm_timer delay instead
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// HTTP channel backing the client in the browser. All paths are relative
/// to the same-origin API mount point.
pub struct ReqwestBackend {
    base: String,
    http: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(base: String) -> ReqwestBackend {
        ReqwestBackend {
            base,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait(?Send)]
impl Backend for ReqwestBackend {
    async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .http
            .request(req.method, format!("{}{}", self.base, req.path));
        if let Some(token) = req.bearer {
            builder = builder.bearer_auth(token.0);
        }
        if let Some(body) = req.body {
            builder = builder.json(&body);
        }
        let send = builder.send().fuse();
        let timeout = wasm_timer::Delay::new(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS));
        let timeout = timeout.fuse();
        pin_mut!(send, timeout);
        let resp = select! {
            resp = send => resp.map_err(|e| TransportError::Network(e.to_string()))?,
            _ = timeout => return Err(TransportError::Timeout),
        };
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?
            .to_vec();
        Ok(HttpResponse { status, body })
    }
}

async fn sleep_for(d: chrono::Duration) {
    wasm_timer::Delay::new(d.to_std().unwrap_or(std::time::Duration::from_secs(0)))
        .await
        .expect("failed sleeping")
}

async fn sleep_until(t: Time) {
    sleep_for(t - Utc::now()).await
}

fn ws_url() -> Option<String> {
    let location = web_sys::window()?.location();
    let proto = match location.protocol().ok()?.as_str() {
        "https:" => "wss:",
        _ => "ws:",
    };
    Some(format!("{proto}//{}/ws/feed", location.host().ok()?))
}

pub async fn start_event_feed(
    client: Rc<ApiClient<ReqwestBackend>>,
    feed_sender: yew::html::Scope<ui::App>,
    mut cancel: oneshot::Sender<()>,
) {
    let mut first_attempt = true;
    let mut failed_attempts = 0;
    'reconnect: loop {
        match first_attempt {
            true => first_attempt = false,
            false => {
                tracing::warn!("lost event feed connection");
                feed_sender.send_message(ui::AppMsg::FeedDisconnected);
                failed_attempts += 1;
                if failed_attempts >= MAX_FAILED_ATTEMPTS {
                    tracing::error!("giving up on the event feed after {failed_attempts} attempts");
                    return;
                }
                sleep_for(chrono::Duration::seconds(ATTEMPT_SPACING_SECS)).await;
            }
        }

        // Tokens rotate, so the current one is read on every attempt
        let token = match client.session() {
            Some(session) => session.access_token,
            None => return,
        };
        let ws_url = match ws_url() {
            Some(url) => url,
            None => return,
        };
        let mut sock = match WsMeta::connect(ws_url, None).await {
            Ok((_, s)) => s,
            Err(_) => continue 'reconnect,
        };

        // The first frame authenticates the socket
        let mut buf = Uuid::encode_buffer();
        let auth_frame: String = token.0.as_hyphenated().encode_lower(&mut buf).into();
        if sock.send(WsMessage::Text(auth_frame)).await.is_err() {
            continue 'reconnect;
        }
        match sock.next().await {
            Some(WsMessage::Text(t)) if t == WS_AUTH_OK => (),
            _ => continue 'reconnect,
        }
        tracing::info!("successfully authenticated to event feed");
        failed_attempts = 0;
        feed_sender.send_message(ui::AppMsg::FeedConnected);

        let mut next_ping = Utc::now();
        let mut last_pong = Utc::now();
        let mut sock = sock.fuse();
        let mut cancellation = cancel.cancellation().fuse();
        loop {
            let delay_pong_reception =
                sleep_until(last_pong + chrono::Duration::seconds(DISCONNECT_INTERVAL_SECS)).fuse();
            let delay_ping_send = sleep_until(next_ping).fuse();
            pin_mut!(delay_ping_send, delay_pong_reception);
            select! {
                _ = cancellation => {
                    if let Err(e) = sock.into_inner().close().await {
                        tracing::warn!(error = ?e, "failed closing event feed socket");
                    }
                    tracing::info!("disconnected from event feed");
                    return;
                }
                _ = delay_pong_reception => continue 'reconnect,
                _ = delay_ping_send => {
                    if sock.send(WsMessage::Text(WS_PING.to_string())).await.is_err() {
                        continue 'reconnect;
                    }
                    next_ping = next_ping + chrono::Duration::seconds(PING_INTERVAL_SECS);
                }
                msg = sock.next() => {
                    let text = match msg {
                        None => continue 'reconnect,
                        Some(WsMessage::Text(t)) => t,
                        Some(WsMessage::Binary(b)) => match String::from_utf8(b) {
                            Ok(t) => t,
                            Err(_) => continue 'reconnect,
                        },
                    };
                    if text == WS_PONG {
                        last_pong = Utc::now();
                    } else {
                        match serde_json::from_str::<FeedEvent>(&text) {
                            Ok(event) => feed_sender.send_message(ui::AppMsg::FeedEvent(event)),
                            Err(e) => tracing::warn!(error = %e, "ignoring malformed feed frame"),
                        }
                    }
                }
            }
        }
    }
}
