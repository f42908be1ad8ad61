use tracing::{debug, warn};

use super::context::X11Context;
use crate::forwarding::traits::X11Requester;

/// Authentication protocol advertised in `x11-req`.
pub const X11_AUTH_PROTOCOL: &str = "MIT-MAGIC-COOKIE-1";

/// Screen number advertised in `x11-req`.
pub const X11_SCREEN: u32 = 0;

/// Ask the server to set up X11 forwarding for a shell channel.
///
/// Sends `x11-req` with the session's fake cookie when forwarding is enabled.
/// No reply is awaited, and a failed send only costs the session its
/// forwarding. Returns whether the request went out.
pub async fn request_forwarding<R>(context: &X11Context, channel: &R) -> bool
where
    R: X11Requester + ?Sized,
{
    if !context.is_forwarding_enabled() {
        return false;
    }
    let cookie = context.get_or_create_cookie();
    match channel.send_x11_request(false, X11_AUTH_PROTOCOL, cookie.hex(), X11_SCREEN).await {
        Ok(()) => {
            debug!(protocol = X11_AUTH_PROTOCOL, screen = X11_SCREEN, "x11 forwarding requested");
            true
        }
        Err(err) => {
            warn!(?err, "failed to request x11 forwarding; continuing without it");
            false
        }
    }
}
