use async_trait::async_trait;
use russh::{Channel, ChannelMsg, client};
use tokio::io::{AsyncRead, AsyncWrite};

// Internal Result type alias for convenience
type Result<T> = crate::SshResult<T>;

/// Trait for streams that can be used for forwarding.
pub trait ForwardStreamIo: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> ForwardStreamIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type alias for boxed forward streams.
pub type ForwardStream = Box<dyn ForwardStreamIo>;

/// Something the remote end of a forwarding channel delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One inbound data frame, exactly as the transport delivered it.
    Data(Vec<u8>),
    /// The remote will send no more data.
    Eof,
    /// The remote closed the channel.
    Close,
}

/// Remote side of a server-initiated forwarding channel.
///
/// `recv` must be cancel-safe: the relay polls it inside `tokio::select!`.
#[async_trait]
pub trait X11ChannelIo: Send + 'static {
    /// Next event in arrival order; `None` once the transport is gone.
    async fn recv(&mut self) -> Option<ChannelEvent>;

    /// Write bytes to the remote and flush them into the transport.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Tell the remote the channel is ready.
    async fn confirm_open(&mut self) -> Result<()>;

    /// Refuse a channel whose local leg could not be established.
    ///
    /// Transports that confirm the open before the handler runs (russh does
    /// for `x11`) can only close the channel here.
    async fn refuse_open(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// Trait for channels that can carry an `x11-req` channel request.
#[async_trait]
pub trait X11Requester: Send + Sync {
    async fn send_x11_request(&self, single_connection: bool, auth_protocol: &str, auth_cookie: &str, screen: u32) -> Result<()>;
}

// Trait implementations for russh types

#[async_trait]
impl X11ChannelIo for Channel<client::Msg> {
    async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.wait().await? {
                ChannelMsg::Data { data } => return Some(ChannelEvent::Data(data.to_vec())),
                ChannelMsg::Eof => return Some(ChannelEvent::Eof),
                ChannelMsg::Close => return Some(ChannelEvent::Close),
                _ => {}
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        Channel::data(self, data).await?;
        Ok(())
    }

    // russh confirms x11 channel opens before the handler sees them.
    async fn confirm_open(&mut self) -> Result<()> {
        Ok(())
    }

    // Already confirmed, so refusing means closing.
    async fn refuse_open(&mut self) -> Result<()> {
        Channel::close(self).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Channel::close(self).await?;
        Ok(())
    }
}

#[async_trait]
impl X11Requester for Channel<client::Msg> {
    async fn send_x11_request(&self, single_connection: bool, auth_protocol: &str, auth_cookie: &str, screen: u32) -> Result<()> {
        Channel::request_x11(self, false, single_connection, auth_protocol, auth_cookie, screen).await?;
        Ok(())
    }
}
