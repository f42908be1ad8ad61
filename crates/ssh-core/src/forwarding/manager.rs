use std::{sync::Arc, time::Duration};

use russh::{Channel, client};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use xb_types::ssh::ForwardingConfig;

use super::{
    traits::{X11ChannelIo, X11Requester},
    x11::{ChannelOpen, RelayOutcome, X11_CHANNEL_TYPE, X11ChannelFactory, X11Context, request_forwarding},
};

type Result<T> = crate::SshResult<T>;

/// How long `shutdown` waits for a relay to wind down before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct ForwardingState {
    x11: Arc<X11Context>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Manages X11 forwarding for one SSH session.
///
/// Cloning is cheap; every clone shares the same session context.
#[derive(Clone)]
pub struct ForwardingManager {
    state: Arc<ForwardingState>,
}

impl Default for ForwardingManager {
    fn default() -> Self {
        Self::new(ForwardingConfig::default())
    }
}

impl ForwardingManager {
    /// Create a new forwarding manager with the given configuration.
    pub fn new(config: ForwardingConfig) -> Self {
        let x11 = Arc::new(X11Context::new(config.x11.as_ref()));
        Self {
            state: Arc::new(ForwardingState {
                x11,
                tasks: tokio::sync::Mutex::new(Vec::new()),
            }),
        }
    }

    /// Per-session X11 state shared by every forwarding channel.
    pub fn x11_context(&self) -> &Arc<X11Context> {
        &self.state.x11
    }

    /// Get human-readable descriptors of all configured forwards.
    pub fn descriptors(&self) -> Vec<String> {
        let mut entries = Vec::new();
        if let Some(target) = self.state.x11.target() {
            entries.push(format!("x11 {target}"));
        }
        entries
    }

    /// Prepare a freshly opened shell channel before the PTY and shell requests.
    ///
    /// Attaches `x11-req` when forwarding is enabled. Never fails the shell.
    pub async fn prepare_channel(&self, channel: &Channel<client::Msg>) -> Result<()> {
        self.prepare_with(channel).await;
        Ok(())
    }

    /// Same as [`prepare_channel`](Self::prepare_channel) for any requester.
    pub async fn prepare_with<R>(&self, channel: &R) -> bool
    where
        R: X11Requester + ?Sized,
    {
        request_forwarding(&self.state.x11, channel).await
    }

    /// Handle a server-initiated `x11` channel.
    ///
    /// The relay runs on its own task; this returns as soon as it is spawned.
    /// Channels the session cannot serve are refused.
    pub async fn handle_x11_channel<C>(&self, channel: C, originator_address: &str, originator_port: u32) -> Result<()>
    where
        C: X11ChannelIo,
    {
        self.handle_channel_open(X11_CHANNEL_TYPE, channel, originator_address, originator_port)
            .await
    }

    /// Offer an inbound channel of any type to the X11 factory.
    pub async fn handle_channel_open<C>(
        &self,
        channel_type: &str,
        channel: C,
        originator_address: &str,
        originator_port: u32,
    ) -> Result<()>
    where
        C: X11ChannelIo,
    {
        let x11 = match X11ChannelFactory::create(&self.state.x11, channel_type, channel) {
            ChannelOpen::Created(x11) => x11,
            ChannelOpen::NotApplicable(mut channel) => {
                debug!(channel_type, "refusing channel not handled by x11 forwarding");
                channel.refuse_open().await?;
                return Ok(());
            }
            ChannelOpen::ConfigMissing(mut channel) => {
                warn!(
                    originator = originator_address,
                    port = originator_port,
                    "server opened an x11 channel but forwarding was not requested"
                );
                channel.refuse_open().await?;
                return Ok(());
            }
        };

        let id = x11.id();
        let target = x11.target().to_string();
        debug!(channel = id, originator = originator_address, port = originator_port, %target, "accepted x11 channel");
        let handle = tokio::spawn(async move {
            match x11.run().await {
                Ok(report) if report.outcome == RelayOutcome::Rejected => {
                    debug!(channel = id, "x11 channel closed after cookie mismatch");
                }
                Ok(report) => {
                    debug!(channel = id, outcome = ?report.outcome, validated = report.validated, "x11 relay finished");
                }
                Err(err) => {
                    warn!(channel = id, ?err, %target, "failed to connect x11 channel to local display");
                }
            }
        });

        let mut tasks = self.state.tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
        Ok(())
    }

    /// Number of live forwarding channels.
    pub fn active_channels(&self) -> usize {
        self.state.x11.active_channels()
    }

    /// Close every forwarding channel of the session.
    pub async fn shutdown(&self) -> Result<()> {
        let live = self.state.x11.close_all();
        if live > 0 {
            info!(channels = live, "closing x11 forwarding channels");
        }
        let mut tasks = self.state.tasks.lock().await;
        for mut handle in tasks.drain(..) {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                handle.abort();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
