use std::sync::Arc;

use tracing::{debug, info};
use xb_types::ssh::DisplayTarget;

use super::{
    bridge::{LocalBridge, LocalEvent, LocalFlow, connect_display},
    context::{ChannelRegistration, X11Context},
    setup::{GateDecision, inspect_first_frame},
};
use crate::forwarding::traits::{ChannelEvent, X11ChannelIo};

type Result<T> = crate::SshResult<T>;

/// Lifecycle of a forwarding channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Opening,
    Connecting,
    Relaying,
    Closed,
    Failed,
}

/// Why a relay stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// One side hit EOF or closed the channel.
    Closed,
    /// The first frame presented the wrong cookie; nothing was forwarded.
    Rejected,
    /// The owning session shut down.
    Cancelled,
    /// An I/O error on either leg.
    Failed,
}

/// Summary of a finished relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    /// The first frame carried the session's fake cookie.
    pub validated: bool,
}

/// One forwarded X11 connection.
///
/// Owns the remote channel and, once connected, the local display socket.
/// The first inbound frame passes the cookie gate exactly once; every later
/// frame is relayed untouched.
pub struct X11Channel<C> {
    io: C,
    registration: ChannelRegistration,
    target: DisplayTarget,
    state: ChannelState,
    initialized: bool,
    validated: bool,
}

impl<C> X11Channel<C>
where
    C: X11ChannelIo,
{
    pub(crate) fn new(context: &Arc<X11Context>, target: DisplayTarget, io: C) -> Self {
        let registration = context.register();
        debug!(channel = registration.id(), target = %target, "x11 channel opening");
        Self {
            io,
            registration,
            target,
            state: ChannelState::Opening,
            initialized: false,
            validated: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.registration.id()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn target(&self) -> &DisplayTarget {
        &self.target
    }

    /// Connect to the local display, acknowledge the open, and relay until
    /// either side goes away.
    ///
    /// A local connect failure refuses the channel and returns the error.
    pub async fn run(mut self) -> Result<RelayReport> {
        self.transition(ChannelState::Connecting);
        let connected = tokio::select! {
            result = connect_display(&self.target) => Some(result),
            _ = self.registration.closed() => None,
        };
        let local = match connected {
            Some(Ok(stream)) => stream,
            Some(Err(err)) => {
                self.transition(ChannelState::Failed);
                let _ = self.io.refuse_open().await;
                return Err(err);
            }
            None => {
                self.transition(ChannelState::Closed);
                let _ = self.io.refuse_open().await;
                return Ok(self.report(RelayOutcome::Cancelled));
            }
        };
        if let Err(err) = self.io.confirm_open().await {
            self.transition(ChannelState::Failed);
            return Err(err);
        }

        self.transition(ChannelState::Relaying);
        info!(channel = self.id(), target = %self.target, "relaying x11 connection");
        let mut bridge = LocalBridge::new(local);
        let outcome = self.relay(&mut bridge).await;

        bridge.shutdown().await;
        let _ = self.io.close().await;
        self.transition(match outcome {
            RelayOutcome::Failed => ChannelState::Failed,
            _ => ChannelState::Closed,
        });
        debug!(channel = self.id(), ?outcome, "x11 channel finished");
        Ok(self.report(outcome))
    }

    async fn relay(&mut self, bridge: &mut LocalBridge) -> RelayOutcome {
        loop {
            tokio::select! {
                _ = self.registration.closed() => return RelayOutcome::Cancelled,
                event = self.io.recv() => match event {
                    Some(ChannelEvent::Data(frame)) => {
                        if let Some(outcome) = self.on_remote_frame(frame, bridge).await {
                            return outcome;
                        }
                    }
                    Some(ChannelEvent::Eof) | Some(ChannelEvent::Close) | None => return RelayOutcome::Closed,
                },
                event = bridge.next_event() => match event {
                    LocalEvent::Data(n) => match bridge.forward(n, &mut self.io).await {
                        Ok(LocalFlow::Open) => {}
                        Ok(LocalFlow::Closed) => return RelayOutcome::Closed,
                        Err(err) => {
                            debug!(channel = self.id(), ?err, "x11 channel write failed");
                            return RelayOutcome::Failed;
                        }
                    },
                    LocalEvent::Closed => return RelayOutcome::Closed,
                    LocalEvent::Failed(err) => {
                        debug!(channel = self.id(), ?err, "x11 display read failed");
                        return RelayOutcome::Failed;
                    }
                },
            }
        }
    }

    /// Remote -> local. Returns an outcome when the frame ends the relay.
    async fn on_remote_frame(&mut self, mut frame: Vec<u8>, bridge: &mut LocalBridge) -> Option<RelayOutcome> {
        if !self.initialized {
            self.initialized = true;
            let context = self.registration.context();
            match inspect_first_frame(&mut frame, context.cookie(), context.local_cookie()) {
                GateDecision::Accept { substituted } => {
                    self.validated = true;
                    debug!(channel = self.id(), substituted, "x11 setup cookie accepted");
                }
                GateDecision::Bypass(reason) => {
                    debug!(channel = self.id(), ?reason, "x11 cookie gate skipped");
                }
                GateDecision::Reject => {
                    debug!(channel = self.id(), "x11 setup cookie mismatch; closing channel");
                    return Some(RelayOutcome::Rejected);
                }
            }
        }
        if let Err(err) = bridge.write_local(&frame).await {
            debug!(channel = self.id(), ?err, "x11 display write failed");
            return Some(RelayOutcome::Failed);
        }
        None
    }

    fn transition(&mut self, next: ChannelState) {
        debug!(channel = self.id(), from = ?self.state, to = ?next, "x11 channel state");
        self.state = next;
    }

    fn report(&self, outcome: RelayOutcome) -> RelayReport {
        RelayReport {
            outcome,
            validated: self.validated,
        }
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
