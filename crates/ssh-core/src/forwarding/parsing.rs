use std::env;

use xb_types::ssh::{X11_BASE_PORT, X11Display, X11Forward};

/// Environment variable naming the local X display.
pub const DISPLAY_ENV: &str = "DISPLAY";

/// Parse an X display name.
///
/// Format: `[host]:display[.screen]`; IPv6 hosts go in brackets.
pub fn parse_x11_display(spec: &str) -> crate::SshResult<X11Display> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(crate::SshCoreError::empty("X display"));
    }
    let (host, number) = trimmed
        .rsplit_once(':')
        .ok_or_else(|| crate::SshCoreError::invalid_display(spec, "expected [host]:display[.screen]"))?;
    let host = normalize_host(host);
    if let Some(host) = &host
        && host.contains(':')
        && !trimmed.starts_with('[')
    {
        return Err(crate::SshCoreError::invalid_display(spec, "IPv6 hosts must be bracketed"));
    }

    let (display, screen) = match number.split_once('.') {
        Some((display, screen)) => (display, Some(screen)),
        None => (number, None),
    };
    let display = parse_number(spec, display, "display")?;
    if display > u16::MAX - X11_BASE_PORT {
        return Err(crate::SshCoreError::invalid_display(spec, "display number out of range"));
    }
    let screen = match screen {
        Some(screen) => parse_number(spec, screen, "screen")?,
        None => 0,
    };
    Ok(X11Display { host, display, screen })
}

/// Parse a hex-encoded MIT-MAGIC-COOKIE-1 value (as printed by `xauth list`).
pub fn parse_x11_cookie(value: &str) -> crate::SshResult<Vec<u8>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::SshCoreError::empty("X11 cookie"));
    }
    hex::decode(trimmed).map_err(|err| crate::SshCoreError::InvalidCookie(err.to_string()))
}

/// Build an X11 forward for the display named by `$DISPLAY`.
///
/// Returns `None` when the variable is unset or empty.
pub fn x11_forward_from_env() -> crate::SshResult<Option<X11Forward>> {
    x11_forward_from_display(env::var(DISPLAY_ENV).ok().as_deref())
}

pub(crate) fn x11_forward_from_display(value: Option<&str>) -> crate::SshResult<Option<X11Forward>> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    Ok(Some(X11Forward {
        display: parse_x11_display(value)?,
        local_cookie: None,
    }))
}

// Helper functions

fn parse_number(spec: &str, value: &str, what: &str) -> crate::SshResult<u16> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(crate::SshCoreError::invalid_display(spec, format!("{what} must be a number")));
    }
    value
        .parse::<u16>()
        .map_err(|_| crate::SshCoreError::invalid_display(spec, format!("{what} number out of range")))
}

fn normalize_host(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let no_brackets = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(|inner| inner.to_string());
    no_brackets.or_else(|| Some(trimmed.to_string()))
}

#[cfg(test)]
#[path = "parsing_tests.rs"]
mod tests;
