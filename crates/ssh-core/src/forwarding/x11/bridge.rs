use futures::FutureExt;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use xb_types::ssh::DisplayTarget;

use crate::forwarding::traits::{ForwardStream, X11ChannelIo};

type Result<T> = crate::SshResult<T>;

/// Upper bound for a single local read.
pub const RELAY_CHUNK: usize = 8 * 1024;

/// Open the local leg of a forwarding channel.
pub(crate) async fn connect_display(target: &DisplayTarget) -> Result<ForwardStream> {
    match target {
        DisplayTarget::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(|source| crate::SshCoreError::ConnectionFailed {
                    address: target.to_string(),
                    source,
                })?;
            stream.set_nodelay(true).ok();
            Ok(Box::new(stream))
        }
        #[cfg(unix)]
        DisplayTarget::Unix { path } => {
            let stream = UnixStream::connect(path)
                .await
                .map_err(|source| crate::SshCoreError::UnixSocketFailed {
                    path: path.clone(),
                    source,
                })?;
            Ok(Box::new(stream))
        }
        #[cfg(not(unix))]
        DisplayTarget::Unix { .. } => Err(crate::SshCoreError::PlatformNotSupported {
            operation: "X11 unix socket displays".into(),
        }),
    }
}

/// What the local socket did.
pub(crate) enum LocalEvent {
    /// `n` bytes are waiting in the bridge buffer.
    Data(usize),
    Closed,
    Failed(std::io::Error),
}

/// Whether the local socket is still usable after a forward.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LocalFlow {
    Open,
    Closed,
}

/// Adapts the local display socket to the forwarding channel.
///
/// Local reads become channel writes; a local close becomes a channel close.
pub(crate) struct LocalBridge {
    stream: ForwardStream,
    buf: Box<[u8]>,
}

impl LocalBridge {
    pub(crate) fn new(stream: ForwardStream) -> Self {
        Self {
            stream,
            buf: vec![0u8; RELAY_CHUNK].into_boxed_slice(),
        }
    }

    /// Wait for the next local read. Cancel-safe.
    pub(crate) async fn next_event(&mut self) -> LocalEvent {
        match self.stream.read(&mut self.buf).await {
            Ok(0) => LocalEvent::Closed,
            Ok(n) => LocalEvent::Data(n),
            Err(err) => LocalEvent::Failed(err),
        }
    }

    /// Send the first `n` buffered bytes to the channel, then keep draining
    /// whatever the socket has ready without waiting for more.
    pub(crate) async fn forward<C>(&mut self, n: usize, channel: &mut C) -> Result<LocalFlow>
    where
        C: X11ChannelIo + ?Sized,
    {
        let mut pending = n;
        loop {
            channel.send(&self.buf[..pending]).await?;
            match self.stream.read(&mut self.buf).now_or_never() {
                Some(Ok(0)) => return Ok(LocalFlow::Closed),
                Some(Ok(read)) => pending = read,
                Some(Err(err)) => return Err(err.into()),
                None => return Ok(LocalFlow::Open),
            }
        }
    }

    /// Write one remote frame to the local display.
    pub(crate) async fn write_local(&mut self, frame: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await
    }

    pub(crate) async fn shutdown(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
