//! X11 forwarding with fake-cookie authentication.
//!
//! The session advertises a per-session fake cookie in `x11-req`. When the
//! server later opens an `x11` channel, the first frame (the X11 connection
//! setup packet) must present that cookie before anything reaches the local
//! display.

mod bridge;
mod channel;
mod context;
mod cookie;
mod factory;
mod request;
mod setup;

pub use bridge::RELAY_CHUNK;
pub use channel::{ChannelState, RelayOutcome, RelayReport, X11Channel};
pub use context::X11Context;
pub use cookie::{COOKIE_LEN, X11Cookie};
pub use factory::{ChannelOpen, X11_CHANNEL_TYPE, X11ChannelFactory};
pub use request::{X11_AUTH_PROTOCOL, X11_SCREEN, request_forwarding};
pub use setup::{BypassReason, ByteOrder, GateDecision, Malformed, SetupHeader, auth_data_range, inspect_first_frame, pad4};
