//! Device authorization flow (RFC 8628 + PKCE) driven by a single task.
//!
//! Each [`DeviceAuthFlow`] owns one tokio task. Commands, timer expiries and
//! HTTP completions are all handled inside that task, one at a time, so state
//! transitions never race each other.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{BoxFuture, OptionFuture};
use serde_json::json;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

use super::browser::{BrowserLauncher, NoopBrowser, SystemBrowser};
use super::device_code::{
    parse_player_token, DeviceCodePoll, DeviceCodeResponse, DeviceCodeSession,
    DEVICE_CODE_GRANT_TYPE, DEVICE_CODE_PATH, DEVICE_TOKEN_PATH, EXCHANGE_JWT_PATH,
    MAX_POLL_INTERVAL_SECS,
};
use super::error::{AuthError, AuthErrorCode, FlowFailure};
use super::events::AuthEvent;
use super::pkce::PkcePair;
use super::result::DeviceAuthResult;
use super::status::{FlowSnapshot, FlowStatus};
use super::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::config::PlayKitConfig;

const EVENT_CAPACITY: usize = 64;

/// What [`DeviceAuthFlow::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new flow began; previous session data was discarded.
    Started,
    /// A flow was already pending or polling and was left untouched.
    AlreadyActive,
}

/// Handle to a device authorization flow.
///
/// Cloning the handle shares the same flow. The driver task stops, and any
/// active flow is torn down, once every handle is dropped. Must be created
/// inside a tokio runtime.
///
/// # Example
/// ```no_run
/// use playkit_auth::auth::{AuthEvent, DeviceAuthFlow};
/// use playkit_auth::config::PlayKitConfig;
///
/// # async fn example() -> Result<(), playkit_auth::auth::AuthError> {
/// let config = PlayKitConfig::from_env().with_game_id("my-game");
/// let flow = DeviceAuthFlow::new(&config)?;
/// let mut events = flow.subscribe();
/// flow.start("my-game", "player:play").await?;
/// while let Ok(event) = events.recv().await {
///     if let AuthEvent::AuthUrlReady { verification_uri, user_code } = &event {
///         println!("Visit {verification_uri} and enter {user_code}");
///     }
///     if let AuthEvent::Success(result) = event {
///         println!("player {}", result.user_id);
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DeviceAuthFlow {
    commands: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<FlowSnapshot>,
    events: broadcast::Sender<AuthEvent>,
}

impl DeviceAuthFlow {
    /// Flow using reqwest and, if configured, the system browser.
    pub fn new(config: &PlayKitConfig) -> Result<Self, AuthError> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
        let browser: Arc<dyn BrowserLauncher> = if config.open_browser() {
            Arc::new(SystemBrowser)
        } else {
            Arc::new(NoopBrowser)
        };
        Ok(Self::with_transport(config, transport, browser))
    }

    /// Flow over caller-supplied HTTP and browser capabilities.
    pub fn with_transport(
        config: &PlayKitConfig,
        transport: Arc<dyn HttpTransport>,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(FlowSnapshot::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let driver = Driver {
            endpoints: Endpoints::from_config(config),
            slow_down_increment: config.slow_down_increment(),
            open_browser: config.open_browser(),
            transport,
            browser,
            snapshot_tx,
            events: events.clone(),
            core: FlowCore::default(),
            generation: 0,
            in_flight: None,
            expiry: None,
            poll_timer: None,
        };
        tokio::spawn(driver.run(command_rx));

        Self {
            commands,
            snapshot_rx,
            events,
        }
    }

    /// Begin a new authorization for `client_id` (the game id).
    ///
    /// A no-op returning [`StartOutcome::AlreadyActive`] while a flow is
    /// pending or polling.
    pub async fn start(
        &self,
        client_id: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<StartOutcome, AuthError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Start {
                client_id: client_id.into(),
                scope: scope.into(),
                reply,
            })
            .map_err(|_| AuthError::FlowClosed)?;
        outcome.await.map_err(|_| AuthError::FlowClosed)
    }

    /// Abort an active flow. Returns `false` if nothing was active.
    pub async fn cancel(&self) -> Result<bool, AuthError> {
        let (reply, cancelled) = oneshot::channel();
        self.commands
            .send(Command::Cancel { reply })
            .map_err(|_| AuthError::FlowClosed)?;
        cancelled.await.map_err(|_| AuthError::FlowClosed)
    }

    /// Run one flow to completion.
    ///
    /// Resolves with the success result, or with the terminal error
    /// (`AuthError::Flow`), `AuthError::Cancelled` if cancelled from another
    /// handle, or `AuthError::AlreadyActive` if a flow was already running.
    pub async fn authorize(
        &self,
        client_id: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<DeviceAuthResult, AuthError> {
        let mut events = self.subscribe();
        match self.start(client_id, scope).await? {
            StartOutcome::Started => Self::wait_for_outcome(&mut events).await,
            StartOutcome::AlreadyActive => Err(AuthError::AlreadyActive),
        }
    }

    /// Drain `events` until the flow that emitted them ends.
    ///
    /// Subscribe before calling [`Self::start`] so no event is missed.
    pub async fn wait_for_outcome(
        events: &mut broadcast::Receiver<AuthEvent>,
    ) -> Result<DeviceAuthResult, AuthError> {
        loop {
            match events.recv().await {
                Ok(AuthEvent::Success(result)) => return Ok(result),
                Ok(AuthEvent::Error { code, message }) => {
                    return Err(AuthError::Flow { code, message })
                }
                Ok(AuthEvent::StatusChanged {
                    new: FlowStatus::Cancelled,
                    ..
                }) => return Err(AuthError::Cancelled),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(AuthError::FlowClosed),
            }
        }
    }

    /// Receive every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Current status and public session data.
    pub fn snapshot(&self) -> FlowSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Subscribe to snapshot changes via a [`watch::Receiver`].
    pub fn watch_snapshot(&self) -> watch::Receiver<FlowSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Current state of the flow.
    pub fn status(&self) -> FlowStatus {
        self.snapshot_rx.borrow().status
    }

    /// `true` while `Pending` or `Polling`.
    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Verification URI of the current session, once the device code arrived.
    pub fn auth_url(&self) -> Option<String> {
        self.snapshot_rx.borrow().verification_uri.clone()
    }

    /// Code the user enters on the verification page, once the device code arrived.
    pub fn user_code(&self) -> Option<String> {
        self.snapshot_rx.borrow().user_code.clone()
    }
}

enum Command {
    Start {
        client_id: String,
        scope: String,
        reply: oneshot::Sender<StartOutcome>,
    },
    Cancel {
        reply: oneshot::Sender<bool>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    DeviceCode,
    TokenPoll,
    PlayerToken,
}

struct Completion {
    generation: u64,
    kind: RequestKind,
    outcome: Result<HttpResponse, AuthError>,
}

enum Wake {
    Command(Option<Command>),
    Expired,
    Completed(Completion),
    PollDue,
}

struct Endpoints {
    device_code: String,
    device_token: String,
    exchange_jwt: String,
}

impl Endpoints {
    fn from_config(config: &PlayKitConfig) -> Self {
        Self {
            device_code: config.endpoint(DEVICE_CODE_PATH),
            device_token: config.endpoint(DEVICE_TOKEN_PATH),
            exchange_jwt: config.endpoint(EXCHANGE_JWT_PATH),
        }
    }
}

/// Status plus every secret held for the current invocation.
#[derive(Default)]
struct FlowCore {
    status: FlowStatus,
    client_id: String,
    scope: String,
    pkce: Option<PkcePair>,
    session: Option<DeviceCodeSession>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl FlowCore {
    fn begin(&mut self, client_id: String, scope: String) {
        self.clear_secrets();
        self.client_id = client_id;
        self.scope = scope;
        self.pkce = Some(PkcePair::generate());
    }

    fn clear_secrets(&mut self) {
        self.pkce = None;
        self.session = None;
        self.access_token = None;
        self.refresh_token = None;
    }

    #[cfg(test)]
    fn holds_secrets(&self) -> bool {
        self.pkce.is_some()
            || self.session.is_some()
            || self.access_token.is_some()
            || self.refresh_token.is_some()
    }

    fn snapshot(&self) -> FlowSnapshot {
        let session = self.session.as_ref();
        FlowSnapshot {
            status: self.status,
            verification_uri: session.map(|s| s.verification_uri.clone()),
            user_code: session.map(|s| s.user_code.clone()),
            poll_interval: session.map(|s| s.poll_interval),
            expires_at: session.map(|s| s.expires_at()),
        }
    }
}

struct Driver {
    endpoints: Endpoints,
    slow_down_increment: Duration,
    open_browser: bool,
    transport: Arc<dyn HttpTransport>,
    browser: Arc<dyn BrowserLauncher>,
    snapshot_tx: watch::Sender<FlowSnapshot>,
    events: broadcast::Sender<AuthEvent>,
    core: FlowCore,
    /// Bumped on every start; completions from older invocations are dropped.
    generation: u64,
    in_flight: Option<BoxFuture<'static, Completion>>,
    expiry: Option<Pin<Box<Sleep>>>,
    poll_timer: Option<Interval>,
}

impl Driver {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            // Order matters: commands first, then the hard expiry deadline,
            // then responses, then the next poll.
            let wake = tokio::select! {
                biased;
                command = commands.recv() => Wake::Command(command),
                Some(()) = OptionFuture::from(self.expiry.as_mut()) => Wake::Expired,
                Some(completion) = OptionFuture::from(self.in_flight.as_mut()) => {
                    Wake::Completed(completion)
                }
                Some(_) = OptionFuture::from(self.poll_timer.as_mut().map(|t| t.tick())) => {
                    Wake::PollDue
                }
            };

            match wake {
                Wake::Command(Some(command)) => self.handle_command(command),
                Wake::Command(None) => break,
                Wake::Expired => self.on_expired(),
                Wake::Completed(completion) => {
                    self.in_flight = None;
                    self.on_completion(completion);
                }
                Wake::PollDue => self.poll_for_token(),
            }
        }
        tracing::debug!("Device auth flow handles dropped, shutting down");
        self.cleanup();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start {
                client_id,
                scope,
                reply,
            } => {
                let outcome = self.start(client_id, scope);
                let _ = reply.send(outcome);
            }
            Command::Cancel { reply } => {
                let cancelled = self.cancel();
                let _ = reply.send(cancelled);
            }
        }
    }

    fn start(&mut self, client_id: String, scope: String) -> StartOutcome {
        if self.core.status.is_active() {
            tracing::warn!("Device auth flow already in progress");
            return StartOutcome::AlreadyActive;
        }

        self.cleanup();
        self.generation = self.generation.wrapping_add(1);
        tracing::info!(client_id = %client_id, scope = %scope, "Starting device auth flow");
        self.core.begin(client_id, scope);
        self.set_status(FlowStatus::Pending);
        self.request_device_code();
        StartOutcome::Started
    }

    fn cancel(&mut self) -> bool {
        if !self.core.status.is_active() {
            return false;
        }
        tracing::info!("Device auth flow cancelled");
        self.finish(FlowStatus::Cancelled, None);
        true
    }

    fn request_device_code(&mut self) {
        let Some(pkce) = &self.core.pkce else {
            return;
        };
        let request = HttpRequest::post_json(
            self.endpoints.device_code.clone(),
            json!({
                "client_id": self.core.client_id,
                "scope": self.core.scope,
                "code_challenge": pkce.challenge(),
                "code_challenge_method": pkce.method(),
            }),
        );
        tracing::debug!(url = %request.url, "Requesting device code");
        self.dispatch(RequestKind::DeviceCode, request);
    }

    fn poll_for_token(&mut self) {
        if self.core.status != FlowStatus::Polling {
            return;
        }
        if self.in_flight.is_some() {
            tracing::debug!("Previous token poll still in flight, skipping tick");
            return;
        }
        let (Some(session), Some(pkce)) = (&self.core.session, &self.core.pkce) else {
            return;
        };
        let request = HttpRequest::post_json(
            self.endpoints.device_token.clone(),
            json!({
                "client_id": self.core.client_id,
                "device_code": session.device_code,
                "grant_type": DEVICE_CODE_GRANT_TYPE,
                "code_verifier": pkce.verifier(),
            }),
        );
        self.dispatch(RequestKind::TokenPoll, request);
    }

    fn exchange_for_player_token(&mut self, access_token: &str) {
        let request = HttpRequest::post_json(
            self.endpoints.exchange_jwt.clone(),
            json!({ "jwt": access_token }),
        )
        .with_bearer(access_token);
        self.dispatch(RequestKind::PlayerToken, request);
    }

    /// Replacing an in-flight request drops, and thereby aborts, the old one.
    fn dispatch(&mut self, kind: RequestKind, request: HttpRequest) {
        let transport = Arc::clone(&self.transport);
        let generation = self.generation;
        self.in_flight = Some(Box::pin(async move {
            let outcome = transport.post_json(request).await;
            Completion {
                generation,
                kind,
                outcome,
            }
        }));
    }

    fn on_completion(&mut self, completion: Completion) {
        let expected = match completion.kind {
            RequestKind::DeviceCode => FlowStatus::Pending,
            RequestKind::TokenPoll | RequestKind::PlayerToken => FlowStatus::Polling,
        };
        if completion.generation != self.generation || self.core.status != expected {
            tracing::debug!(kind = ?completion.kind, "Discarding stale response");
            return;
        }
        match completion.kind {
            RequestKind::DeviceCode => self.on_device_code(completion.outcome),
            RequestKind::TokenPoll => self.on_token_response(completion.outcome),
            RequestKind::PlayerToken => self.on_player_token(completion.outcome),
        }
    }

    fn on_device_code(&mut self, outcome: Result<HttpResponse, AuthError>) {
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "Device code request failed");
                return self.fail(FlowFailure::new(
                    AuthErrorCode::NetworkError,
                    "Failed to request device code",
                ));
            }
        };
        tracing::debug!(status = response.status, "Device code response");
        if response.status != 200 {
            return self.fail(FlowFailure::new(
                AuthErrorCode::HttpError,
                format!("HTTP {}: {}", response.status, response.body),
            ));
        }
        let payload: DeviceCodeResponse = match serde_json::from_str(&response.body) {
            Ok(payload) => payload,
            Err(_) => {
                return self.fail(FlowFailure::new(
                    AuthErrorCode::ParseError,
                    "Failed to parse device code response",
                ))
            }
        };
        let session = match DeviceCodeSession::from_response(payload, Utc::now()) {
            Ok(session) => session,
            Err(failure) => return self.fail(failure),
        };

        tracing::info!(
            user_code = %session.user_code,
            verification_uri = %session.verification_uri,
            "Device code received"
        );
        self.emit(AuthEvent::AuthUrlReady {
            verification_uri: session.verification_uri.clone(),
            user_code: session.user_code.clone(),
        });
        if self.open_browser {
            if let Err(err) = self.browser.open(&session.launch_url()) {
                tracing::warn!(error = %err, "Could not open verification URL");
            }
        }
        self.start_polling(session);
    }

    fn start_polling(&mut self, session: DeviceCodeSession) {
        self.expiry = Some(Box::pin(time::sleep(session.expires_in)));
        self.poll_timer = Some(poll_interval(session.poll_interval));
        tracing::info!(
            interval_secs = session.poll_interval.as_secs(),
            expires_in_secs = session.expires_in.as_secs(),
            "Polling for authorization"
        );
        self.core.session = Some(session);
        self.set_status(FlowStatus::Polling);
    }

    fn on_token_response(&mut self, outcome: Result<HttpResponse, AuthError>) {
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "Token poll failed, will retry");
                return;
            }
        };
        tracing::debug!(status = response.status, "Token poll response");

        match DeviceCodePoll::classify(response.status, &response.body) {
            DeviceCodePoll::Pending => {
                tracing::debug!("Authorization pending");
            }
            DeviceCodePoll::SlowDown => self.slow_down(),
            DeviceCodePoll::Authorized {
                access_token,
                refresh_token,
            } => {
                tracing::info!("Access token received, exchanging for player token");
                self.poll_timer = None;
                self.exchange_for_player_token(&access_token);
                self.core.access_token = Some(access_token);
                self.core.refresh_token = refresh_token;
            }
            DeviceCodePoll::Expired => self.finish(
                FlowStatus::Expired,
                Some(FlowFailure::new(AuthErrorCode::Expired, "Device code expired")),
            ),
            DeviceCodePoll::AccessDenied => self.fail(FlowFailure::new(
                AuthErrorCode::AccessDenied,
                "User denied authorization",
            )),
            DeviceCodePoll::Failed(failure) => self.fail(failure),
        }
    }

    fn slow_down(&mut self) {
        let Some(session) = self.core.session.as_mut() else {
            return;
        };
        session.poll_interval = session
            .poll_interval
            .saturating_add(self.slow_down_increment)
            .min(Duration::from_secs(MAX_POLL_INTERVAL_SECS));
        let interval = session.poll_interval;
        self.poll_timer = Some(poll_interval(interval));
        tracing::info!(interval_secs = interval.as_secs(), "Server asked to slow down");
        self.publish();
    }

    fn on_player_token(&mut self, outcome: Result<HttpResponse, AuthError>) {
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "Player token exchange failed");
                return self.fail(FlowFailure::new(
                    AuthErrorCode::NetworkError,
                    "Failed to exchange for player token",
                ));
            }
        };
        tracing::debug!(status = response.status, "Player token response");
        let access_token = self.core.access_token.clone().unwrap_or_default();
        let refresh_token = self.core.refresh_token.clone();
        match parse_player_token(
            response.status,
            &response.body,
            access_token,
            refresh_token,
            Utc::now(),
        ) {
            Ok(result) => {
                tracing::info!(user_id = %result.user_id, "Device authorization succeeded");
                self.cleanup();
                self.set_status(FlowStatus::Success);
                self.emit(AuthEvent::Success(result));
            }
            Err(failure) => self.fail(failure),
        }
    }

    fn on_expired(&mut self) {
        self.expiry = None;
        if !self.core.status.is_active() {
            return;
        }
        tracing::warn!("Device code expired");
        self.finish(
            FlowStatus::Expired,
            Some(FlowFailure::new(
                AuthErrorCode::Expired,
                "Device code expired. Please start again.",
            )),
        );
    }

    fn fail(&mut self, failure: FlowFailure) {
        tracing::error!(code = %failure.code, message = %failure.message, "Device authorization failed");
        self.finish(FlowStatus::Error, Some(failure));
    }

    /// Tear down, then make the terminal state and its event observable.
    fn finish(&mut self, status: FlowStatus, failure: Option<FlowFailure>) {
        self.cleanup();
        self.set_status(status);
        if let Some(failure) = failure {
            self.emit(AuthEvent::error(failure));
        }
    }

    /// Idempotent: abort the request, disarm both timers, drop all secrets.
    fn cleanup(&mut self) {
        self.in_flight = None;
        self.expiry = None;
        self.poll_timer = None;
        self.core.clear_secrets();
    }

    fn set_status(&mut self, status: FlowStatus) {
        let old = self.core.status;
        if old == status {
            return;
        }
        self.core.status = status;
        self.publish();
        tracing::debug!(old = %old, new = %status, "Device auth status changed");
        self.emit(AuthEvent::StatusChanged { old, new: status });
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.core.snapshot());
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Repeating timer whose first tick is one full period away.
///
/// The period is kept within 1 s..=`MAX_POLL_INTERVAL_SECS` so the deadline
/// arithmetic can neither panic on zero nor overflow.
fn poll_interval(period: Duration) -> Interval {
    let period = period.clamp(
        Duration::from_secs(1),
        Duration::from_secs(MAX_POLL_INTERVAL_SECS),
    );
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
