use std::sync::Arc;

use tracing::debug;

use super::{channel::X11Channel, context::X11Context};
use crate::forwarding::traits::X11ChannelIo;

/// Channel type the server uses for forwarded X11 connections.
pub const X11_CHANNEL_TYPE: &str = "x11";

/// Result of offering an inbound channel to the factory.
///
/// The variants that did not create a channel hand the transport channel back
/// so the caller can refuse it.
pub enum ChannelOpen<C> {
    Created(X11Channel<C>),
    /// Not an `x11` channel.
    NotApplicable(C),
    /// The session never enabled X11 forwarding.
    ConfigMissing(C),
}

impl<C> ChannelOpen<C> {
    pub fn is_created(&self) -> bool {
        matches!(self, ChannelOpen::Created(_))
    }
}

pub struct X11ChannelFactory;

impl X11ChannelFactory {
    pub fn create<C>(context: &Arc<X11Context>, channel_type: &str, io: C) -> ChannelOpen<C>
    where
        C: X11ChannelIo,
    {
        if channel_type != X11_CHANNEL_TYPE {
            return ChannelOpen::NotApplicable(io);
        }
        let Some(target) = context.target() else {
            debug!("x11 channel offered but forwarding is not enabled for this session");
            return ChannelOpen::ConfigMissing(io);
        };
        ChannelOpen::Created(X11Channel::new(context, target.clone(), io))
    }
}
