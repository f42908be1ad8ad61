use std::{
    collections::HashSet,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use once_cell::sync::OnceCell;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use xb_types::ssh::{DisplayTarget, X11Forward};

use super::cookie::X11Cookie;

/// Per-session X11 forwarding state.
///
/// One context exists per SSH transport session and is shared by every
/// forwarding channel of that session. It carries the pending forward (the
/// local display target), the lazily generated fake cookie, and the registry
/// of live channels used for teardown.
pub struct X11Context {
    target: Option<DisplayTarget>,
    local_cookie: Option<Vec<u8>>,
    cookie: OnceCell<X11Cookie>,
    channels: Mutex<HashSet<u64>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
    close_tx: broadcast::Sender<()>,
}

impl X11Context {
    pub fn new(config: Option<&X11Forward>) -> Self {
        let (close_tx, _) = broadcast::channel(1);
        Self {
            target: config.and_then(|forward| {
                let target = forward.display.target();
                if target.is_none() {
                    warn!(display = %forward.display, "x11 display has no reachable port; forwarding disabled");
                }
                target
            }),
            local_cookie: config.and_then(|forward| forward.local_cookie.clone()),
            cookie: OnceCell::new(),
            channels: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
            close_tx,
        }
    }

    /// Context for a session without X11 forwarding.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_forwarding_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Local display that forwarded connections are relayed to.
    pub fn target(&self) -> Option<&DisplayTarget> {
        self.target.as_ref()
    }

    /// Real local display cookie, if one was configured.
    pub fn local_cookie(&self) -> Option<&[u8]> {
        self.local_cookie.as_deref()
    }

    /// The fake cookie, if one has been generated for this session.
    pub fn cookie(&self) -> Option<&X11Cookie> {
        self.cookie.get()
    }

    /// Return the session's fake cookie, generating it on first use.
    ///
    /// Concurrent first callers race into a single initialisation; all of them
    /// observe the same value.
    pub fn get_or_create_cookie(&self) -> &X11Cookie {
        self.cookie.get_or_init(|| {
            debug!("generated X11 fake cookie for session");
            X11Cookie::generate()
        })
    }

    /// Install a specific cookie; fails if one is already set.
    pub fn install_cookie(&self, cookie: X11Cookie) -> Result<(), X11Cookie> {
        self.cookie.set(cookie)
    }

    /// Number of forwarding channels currently registered.
    pub fn active_channels(&self) -> usize {
        self.channels.lock().map(|set| set.len()).unwrap_or(0)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Signal every live channel of this session to close.
    ///
    /// Returns the number of channels that were registered at the time.
    pub fn close_all(&self) -> usize {
        self.shut_down.store(true, Ordering::SeqCst);
        let _ = self.close_tx.send(());
        self.active_channels()
    }

    pub(crate) fn register(self: &Arc<Self>) -> ChannelRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let closed = self.close_tx.subscribe();
        if let Ok(mut set) = self.channels.lock() {
            set.insert(id);
        }
        ChannelRegistration {
            id,
            context: Arc::clone(self),
            closed,
        }
    }
}

impl Default for X11Context {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Registration of one forwarding channel; unregisters on drop.
pub(crate) struct ChannelRegistration {
    id: u64,
    context: Arc<X11Context>,
    closed: broadcast::Receiver<()>,
}

impl ChannelRegistration {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn context(&self) -> &Arc<X11Context> {
        &self.context
    }

    /// Resolves once the owning session shuts down. Cancel-safe.
    pub(crate) async fn closed(&mut self) {
        if self.context.is_shut_down() {
            return;
        }
        let _ = self.closed.recv().await;
    }
}

impl Drop for ChannelRegistration {
    fn drop(&mut self) {
        if let Ok(mut set) = self.context.channels.lock() {
            set.remove(&self.id);
        }
        debug!(channel = self.id, "x11 channel unregistered");
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
