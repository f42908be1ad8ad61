//! russh client handler that serves server-initiated `x11` channels.

use std::sync::Arc;

use russh::{
    Channel,
    client::{self, Msg, Session},
    keys::{HashAlg, PublicKey},
};
use tokio::net::ToSocketAddrs;
use tracing::{debug, warn};

use crate::{SshCoreError, SshResult, forwarding::ForwardingManager};

/// Decides whether a server host key is trusted.
pub trait ServerKeyCheck: Send + Sync + 'static {
    fn check(&self, key: &PublicKey) -> SshResult<bool>;
}

/// Trusts every host key. Only for tests and throwaway sessions.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAny;

impl ServerKeyCheck for AcceptAny {
    fn check(&self, _key: &PublicKey) -> SshResult<bool> {
        Ok(true)
    }
}

/// Trusts exactly one SHA256 fingerprint (`SHA256:<base64>`, prefix optional).
#[derive(Clone, Debug)]
pub struct KnownFingerprint {
    expected: String,
}

impl KnownFingerprint {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        let fingerprint = fingerprint.into();
        let expected = fingerprint
            .trim()
            .strip_prefix("SHA256:")
            .unwrap_or(fingerprint.trim())
            .to_string();
        Self { expected }
    }
}

impl ServerKeyCheck for KnownFingerprint {
    fn check(&self, key: &PublicKey) -> SshResult<bool> {
        let presented = key.fingerprint(HashAlg::Sha256).to_string();
        let bare = presented.strip_prefix("SHA256:").unwrap_or(&presented);
        if bare == self.expected {
            Ok(true)
        } else {
            Err(SshCoreError::HostKeyRejected(presented))
        }
    }
}

/// Client handler for sessions that forward X11.
pub struct ForwardingClient<K = AcceptAny> {
    keys: Arc<K>,
    forwarding: ForwardingManager,
}

impl<K> ForwardingClient<K>
where
    K: ServerKeyCheck,
{
    pub fn new(keys: K, forwarding: ForwardingManager) -> Self {
        Self {
            keys: Arc::new(keys),
            forwarding,
        }
    }

    pub fn forwarding(&self) -> &ForwardingManager {
        &self.forwarding
    }
}

impl<K> Clone for ForwardingClient<K> {
    fn clone(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
            forwarding: self.forwarding.clone(),
        }
    }
}

impl<K> client::Handler for ForwardingClient<K>
where
    K: ServerKeyCheck,
{
    type Error = SshCoreError;

    fn check_server_key(&mut self, server_public_key: &PublicKey) -> impl std::future::Future<Output = Result<bool, Self::Error>> + Send {
        let verdict = self.keys.check(server_public_key);
        async move { verdict }
    }

    fn server_channel_open_x11(
        &mut self,
        channel: Channel<Msg>,
        originator_address: &str,
        originator_port: u32,
        _session: &mut Session,
    ) -> impl std::future::Future<Output = Result<(), Self::Error>> + Send {
        let forwarding = self.forwarding.clone();
        let originator = originator_address.to_string();
        async move {
            debug!(originator = %originator, port = originator_port, "server opened x11 channel");
            if let Err(err) = forwarding.handle_x11_channel(channel, &originator, originator_port).await {
                warn!(?err, "x11 forwarded connection failed");
            }
            Ok(())
        }
    }
}

/// Open a transport session to `addrs` using a forwarding-aware handler.
pub async fn connect<K, A>(config: Arc<client::Config>, addrs: A, handler: ForwardingClient<K>) -> SshResult<client::Handle<ForwardingClient<K>>>
where
    K: ServerKeyCheck,
    A: ToSocketAddrs,
{
    client::connect(config, addrs, handler).await
}
