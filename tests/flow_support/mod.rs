#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use playkit_auth::auth::{
    AuthError, AuthEvent, BrowserLauncher, DeviceAuthFlow, HttpRequest, HttpResponse,
    HttpTransport,
};
use playkit_auth::config::PlayKitConfig;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::Instant;

pub const BASE_URL: &str = "http://playkit.test";
pub const CODE: &str = "/api/auth/device/code";
pub const TOKEN: &str = "/api/auth/device/token";
pub const EXCHANGE: &str = "/api/external/exchange-jwt";

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond {
        status: u16,
        body: String,
        delay: Duration,
    },
    /// Transport failure: no HTTP response at all.
    Fail,
    /// Never completes; only ends by being dropped.
    Hang,
}

impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self::Respond {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self::Respond {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(self, by: Duration) -> Self {
        match self {
            Self::Respond { status, body, .. } => Self::Respond {
                status,
                body,
                delay: by,
            },
            other => other,
        }
    }

    pub fn pending() -> Self {
        Self::json(400, json!({ "error": "authorization_pending" }))
    }

    pub fn slow_down() -> Self {
        Self::json(400, json!({ "error": "slow_down" }))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub at: Instant,
    pub bearer: Option<String>,
    pub body: Value,
}

/// In-memory [`HttpTransport`] answering from per-endpoint scripts.
///
/// Each endpoint replays its queue in order, then repeats its fallback
/// (if any). An endpoint with neither hangs.
#[derive(Default)]
pub struct ScriptedTransport {
    queues: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallbacks: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
    aborted: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, path: &str, reply: Reply) -> &Self {
        self.queues
            .lock()
            .expect("queue lock poisoned")
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn always(&self, path: &str, reply: Reply) -> &Self {
        self.fallbacks
            .lock()
            .expect("fallback lock poisoned")
            .insert(path.to_string(), reply);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request lock poisoned").clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Requests whose future was dropped before it produced a reply.
    pub fn aborted(&self) -> usize {
        self.aborted.load(Ordering::SeqCst)
    }

    fn next_reply(&self, path: &str) -> Reply {
        let queued = self
            .queues
            .lock()
            .expect("queue lock poisoned")
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        queued
            .or_else(|| {
                self.fallbacks
                    .lock()
                    .expect("fallback lock poisoned")
                    .get(path)
                    .cloned()
            })
            .unwrap_or(Reply::Hang)
    }
}

struct AbortGuard {
    aborted: Arc<AtomicUsize>,
    armed: bool,
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            self.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        self.requests
            .lock()
            .expect("request lock poisoned")
            .push(RecordedRequest {
                path: path.clone(),
                at: Instant::now(),
                bearer: request.bearer_token.clone(),
                body: request.body.clone(),
            });

        let mut guard = AbortGuard {
            aborted: Arc::clone(&self.aborted),
            armed: true,
        };
        let outcome = match self.next_reply(&path) {
            Reply::Respond {
                status,
                body,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(HttpResponse { status, body })
            }
            Reply::Fail => Err(AuthError::Network("connection reset by peer".to_string())),
            Reply::Hang => futures::future::pending().await,
        };
        guard.armed = false;
        outcome
    }
}

/// Records every URL it is asked to open.
#[derive(Default)]
pub struct RecordingBrowser {
    opened: Mutex<Vec<String>>,
}

impl RecordingBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("browser lock poisoned").clone()
    }
}

impl BrowserLauncher for RecordingBrowser {
    fn open(&self, url: &str) -> Result<(), AuthError> {
        self.opened
            .lock()
            .expect("browser lock poisoned")
            .push(url.to_string());
        Ok(())
    }
}

pub fn config() -> PlayKitConfig {
    PlayKitConfig::new()
        .with_base_url(BASE_URL)
        .with_game_id("game-1")
}

pub fn flow(transport: &Arc<ScriptedTransport>, browser: &Arc<RecordingBrowser>) -> DeviceAuthFlow {
    DeviceAuthFlow::with_transport(&config(), transport.clone(), browser.clone())
}

/// The device-code reply used by most scenarios.
pub fn device_code(interval: u64, expires_in: u64) -> Reply {
    Reply::json(
        200,
        json!({
            "device_code": "dc1",
            "user_code": "ABCD-1234",
            "verification_uri": "https://x/verify",
            "interval": interval,
            "expires_in": expires_in,
        }),
    )
}

pub fn player_token() -> Reply {
    Reply::json(
        200,
        json!({ "userId": "u1", "playerToken": "pt1", "expiresIn": 3600 }),
    )
}

/// Next event, letting paused time run forward as far as needed.
pub async fn next_event(events: &mut broadcast::Receiver<AuthEvent>) -> AuthEvent {
    tokio::time::timeout(Duration::from_secs(3600), events.recv())
        .await
        .expect("no event within an hour")
        .expect("event channel closed")
}

/// Everything already queued, without waiting.
pub fn drain(events: &mut broadcast::Receiver<AuthEvent>) -> Vec<AuthEvent> {
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => seen.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return seen,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
}

/// Wait `by` of (paused) time, giving the driver a chance to react.
pub async fn advance(by: Duration) {
    tokio::time::sleep(by).await;
}
