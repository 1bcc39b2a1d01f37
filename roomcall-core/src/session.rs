//! Call session controller
//!
//! Drives a [`SessionState`] against the relay, the capture device and the
//! view. One `CallSession` belongs to one room activation and is owned by a
//! single task; relay events and user commands are handled one at a time.

use crate::config::SessionConfig;
use crate::media::MediaCapture;
use crate::signaling::{SignalingEvent, SignalingService};
use crate::state::{DialError, Effect, SessionSnapshot, SessionState};
use crate::types::{CallId, SessionPhase};
use crate::view::{Notice, SessionView};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// User commands for [`CallSession::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Call the peer with this identity
    Dial(String),
    /// End the active call
    HangUp,
    /// Leave the room
    Teardown,
}

/// One room's call session
pub struct CallSession<S, C, V>
where
    S: SignalingService,
    C: MediaCapture,
    V: SessionView,
{
    signaling: Arc<S>,
    capture: Arc<C>,
    view: Arc<V>,
    config: SessionConfig,
    state: SessionState<S::PeerId>,
    events: Option<broadcast::Receiver<SignalingEvent<S::PeerId>>>,
}

impl<S, C, V> CallSession<S, C, V>
where
    S: SignalingService,
    C: MediaCapture,
    V: SessionView,
{
    /// Create a session and subscribe to relay events
    pub fn new(signaling: Arc<S>, capture: Arc<C>, view: Arc<V>, config: SessionConfig) -> Self {
        let events = Some(signaling.subscribe());
        Self {
            signaling,
            capture,
            view,
            config,
            state: SessionState::new(),
            events,
        }
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Session state, read-only
    pub fn state(&self) -> &SessionState<S::PeerId> {
        &self.state
    }

    /// Snapshot for display
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Register with the relay, then acquire local media
    ///
    /// Failures are reported through the view and leave the session in
    /// `Failed`; the returned phase tells the caller where it ended up.
    ///
    /// Only an unregistered session registers; later calls return the
    /// current phase without touching the relay.
    #[tracing::instrument(skip(self))]
    pub async fn activate(&mut self) -> SessionPhase {
        if self.phase() != SessionPhase::Unregistered {
            tracing::debug!(phase = ?self.phase(), "Session already activated");
            return self.phase();
        }
        tracing::info!(relay = %self.config.signaling.url(), "Activating session");
        let effects = match self.signaling.register().await {
            Ok(identity) => self.state.on_registered(identity),
            Err(e) => self.state.on_registration_failed(&e),
        };
        self.apply(effects).await;
        self.phase()
    }

    /// Place a call to a user-typed identity
    ///
    /// # Errors
    ///
    /// Returns the failed precondition or the relay's refusal. Every error
    /// is also surfaced to the view.
    #[tracing::instrument(skip(self))]
    pub async fn dial(&mut self, target: &str) -> Result<CallId, DialError> {
        let target = match self.state.check_dial(target) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(error = %e, "Dial rejected");
                self.view.notify(&Notice::DialRejected(e.to_string()));
                return Err(e);
            }
        };

        let Some(local) = self.state.local_stream().cloned() else {
            return Err(DialError::NoLocalMedia);
        };

        tracing::info!(%target, "Dialing");
        let reason = match self.signaling.dial(&target, &local).await {
            Ok(Some(call)) => {
                let call_id = call.id;
                let effects = self.state.on_dialed(call);
                self.apply(effects).await;
                return match self.state.active_call() {
                    Some(active) if active.id == call_id => Ok(call_id),
                    Some(active) => Err(DialError::Superseded(active.peer.to_string())),
                    None => Err(DialError::Refused("session no longer usable".to_string())),
                };
            }
            Ok(None) => "the relay refused the call".to_string(),
            Err(e) => e.to_string(),
        };
        let effects = self.state.on_dial_failed(&target, &reason);
        self.apply(effects).await;
        Err(DialError::Refused(reason))
    }

    /// Ask the relay to close the active call
    ///
    /// State is cleared when the relay reports the close, through the same
    /// guarded path as a remote hang-up.
    #[tracing::instrument(skip(self))]
    pub async fn hang_up(&mut self) {
        let Some(call) = self.state.active_call().cloned() else {
            tracing::debug!("No active call to hang up");
            return;
        };
        if let Err(e) = self.signaling.hang_up(&call).await {
            tracing::warn!(call_id = %call.id, error = %e, "Hang up failed");
        }
    }

    /// Feed one relay event through the state machine
    pub async fn handle_event(&mut self, event: SignalingEvent<S::PeerId>) {
        tracing::trace!(kind = event.kind(), "Relay event");
        let effects = match event {
            SignalingEvent::IncomingCall { call } => self.state.on_incoming(call),
            SignalingEvent::Stream {
                call_id,
                peer,
                stream,
            } => self.state.on_stream(call_id, &peer, stream),
            SignalingEvent::CallClosed { call_id, peer } => self.state.on_call_closed(call_id, &peer),
            SignalingEvent::CallError {
                call_id,
                peer,
                reason,
            } => self.state.on_call_error(call_id, &peer, &reason),
            SignalingEvent::Disconnected => self.state.on_signaling_lost("disconnected"),
            SignalingEvent::Closed => self.state.on_signaling_lost("connection closed"),
        };
        self.apply(effects).await;
    }

    /// Handle every relay event already queued, without waiting
    ///
    /// Returns how many events were handled.
    pub async fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let next = match self.events.as_mut() {
                Some(rx) => rx.try_recv(),
                None => break,
            };
            match next {
                Ok(event) => {
                    self.handle_event(event).await;
                    handled += 1;
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    self.on_events_dropped(skipped).await;
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    self.events = None;
                    self.on_event_stream_ended().await;
                    break;
                }
            }
        }
        handled
    }

    /// Release every resource. Safe to call more than once.
    #[tracing::instrument(skip(self))]
    pub async fn teardown(&mut self) {
        let effects = self.state.teardown();
        self.apply(effects).await;
        self.events = None;
    }

    /// Run until a `Teardown` command arrives or the command channel closes
    ///
    /// Tears the session down before returning its final snapshot.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> SessionSnapshot {
        if self.phase() == SessionPhase::Unregistered {
            self.activate().await;
        }

        let mut events = self.events.take();
        loop {
            tokio::select! {
                event = next_event(&mut events) => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        self.on_events_dropped(skipped).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        events = None;
                        self.on_event_stream_ended().await;
                    }
                },
                command = commands.recv() => match command {
                    Some(SessionCommand::Dial(target)) => {
                        // failures already reached the view
                        let _ = self.dial(&target).await;
                    }
                    Some(SessionCommand::HangUp) => self.hang_up().await,
                    Some(SessionCommand::Teardown) | None => break,
                },
            }
        }

        self.teardown().await;
        self.snapshot()
    }

    async fn on_events_dropped(&mut self, skipped: u64) {
        let effects = self.state.on_events_dropped(skipped);
        self.apply(effects).await;
    }

    async fn on_event_stream_ended(&mut self) {
        let effects = self.state.on_signaling_lost("relay event stream ended");
        self.apply(effects).await;
    }

    async fn apply(&mut self, effects: Vec<Effect<S::PeerId>>) {
        let mut queue: VecDeque<_> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::RequestCapture => {
                    let result = self
                        .capture
                        .request_capture(&self.config.constraints)
                        .await;
                    let more = match result {
                        Ok(stream) => self.state.on_media(stream),
                        Err(e) => self.state.on_media_failed(&e),
                    };
                    queue.extend(more);
                }
                Effect::ShowLocal(stream) => self.view.show_local(stream.as_ref()),
                Effect::ShowRemote(stream) => self.view.show_remote(stream.as_ref()),
                Effect::Answer { call, local } => {
                    if let Err(e) = self.signaling.answer(&call, &local).await {
                        let more = self.state.on_call_error(call.id, &call.peer, &e.to_string());
                        queue.extend(more);
                    }
                }
                Effect::HangUp(call) => {
                    if let Err(e) = self.signaling.hang_up(&call).await {
                        tracing::warn!(call_id = %call.id, error = %e, "Hang up failed");
                    }
                }
                Effect::Notify(notice) => self.view.notify(&notice),
                Effect::ReleaseSignaling => {
                    self.signaling.destroy().await;
                    tracing::info!("Relay connection released");
                }
            }
        }
    }
}

async fn next_event<I: crate::identity::PeerIdentity>(
    events: &mut Option<broadcast::Receiver<SignalingEvent<I>>>,
) -> Result<SignalingEvent<I>, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => futures::future::pending().await,
    }
}
