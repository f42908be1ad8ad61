use std::env;

use russh::{
    Channel,
    Disconnect,
    client::{self, Handle, Msg},
};

use crate::forwarding::ForwardingManager;

pub type SessionHandle<H> = Handle<H>;

/// Parameters for an interactive shell channel.
#[derive(Clone)]
pub struct ShellOptions {
    pub term: String,
    pub cols: u32,
    pub rows: u32,
    pub forwarding: ForwardingManager,
}

impl ShellOptions {
    /// 80x24 with `$TERM` (or `xterm`).
    pub fn new(forwarding: ForwardingManager) -> Self {
        Self {
            term: env::var("TERM").unwrap_or_else(|_| "xterm".into()),
            cols: 80,
            rows: 24,
            forwarding,
        }
    }

    pub fn with_size(mut self, cols: u32, rows: u32) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }
}

/// Open a session channel with a PTY and a shell.
///
/// X11 forwarding is requested between channel open and the PTY request when
/// the session has it enabled. The ready channel is handed to the caller.
pub async fn open_shell<H>(session: &SessionHandle<H>, options: &ShellOptions) -> crate::SshResult<Channel<Msg>>
where
    H: client::Handler,
{
    let channel = session.channel_open_session().await?;
    options.forwarding.prepare_channel(&channel).await?;
    channel
        .request_pty(true, &options.term, options.cols, options.rows, 0, 0, &[])
        .await?;
    channel.request_shell(true).await?;
    Ok(channel)
}

/// Open a session channel running `command`, with X11 forwarding when enabled.
pub async fn open_exec<H>(session: &SessionHandle<H>, command: &str, forwarding: &ForwardingManager) -> crate::SshResult<Channel<Msg>>
where
    H: client::Handler,
{
    let channel = session.channel_open_session().await?;
    forwarding.prepare_channel(&channel).await?;
    channel.exec(true, command.as_bytes()).await?;
    Ok(channel)
}

/// Close every forwarding channel, then the transport.
pub async fn disconnect<H>(session: &SessionHandle<H>, forwarding: &ForwardingManager)
where
    H: client::Handler,
{
    let _ = forwarding.shutdown().await;
    let _ = session.disconnect(Disconnect::ByApplication, "", "").await;
}
