pub mod client;
pub mod error;
pub mod forwarding;
pub mod logging;
pub mod session;

pub use error::{SshCoreError, SshResult};
