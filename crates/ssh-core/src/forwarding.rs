//! X11 forwarding over SSH sessions.
//!
//! This module provides functionality for:
//! - Advertising a per-session fake cookie in `x11-req`
//! - Accepting server-initiated `x11` channels and relaying them to the local display
//! - Parsing display names and cookies from user input or `$DISPLAY`
//!
//! The main entry point is [`ForwardingManager`], which owns the X11 state of
//! one SSH session.

mod manager;
mod parsing;
mod traits;
pub mod x11;

// Re-export public API
pub use manager::ForwardingManager;
pub use parsing::{DISPLAY_ENV, parse_x11_cookie, parse_x11_display, x11_forward_from_env};
pub use traits::{ChannelEvent, ForwardStream, ForwardStreamIo, X11ChannelIo, X11Requester};
