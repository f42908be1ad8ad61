use std::fmt;

use rand::RngCore;

/// Length in bytes of an MIT-MAGIC-COOKIE-1 cookie.
pub const COOKIE_LEN: usize = 16;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Fake MIT-MAGIC-COOKIE-1 advertised to the remote host.
///
/// Holds the raw bytes and their lower-case hex form. The hex form is what the
/// remote sshd receives in `x11-req`; X clients on the remote host then present
/// the raw bytes in their setup packet.
#[derive(Clone, PartialEq, Eq)]
pub struct X11Cookie {
    raw: [u8; COOKIE_LEN],
    hex: String,
}

impl X11Cookie {
    /// Generate a fresh random cookie.
    pub fn generate() -> Self {
        let mut raw = [0u8; COOKIE_LEN];
        rand::thread_rng().fill_bytes(&mut raw);
        Self::from_bytes(raw)
    }

    pub fn from_bytes(raw: [u8; COOKIE_LEN]) -> Self {
        let hex = encode_hex(&raw);
        Self { raw, hex }
    }

    /// Parse the 32-character hex form.
    pub fn from_hex(hex: &str) -> crate::SshResult<Self> {
        let mut raw = [0u8; COOKIE_LEN];
        hex::decode_to_slice(hex.trim(), &mut raw)
            .map_err(|err| crate::SshCoreError::InvalidCookie(format!("expected {} hex characters: {err}", COOKIE_LEN * 2)))?;
        Ok(Self::from_bytes(raw))
    }

    pub fn raw(&self) -> &[u8; COOKIE_LEN] {
        &self.raw
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Compare the auth data presented by an X client against this cookie.
    pub fn matches(&self, presented: &[u8]) -> bool {
        presented.len() == COOKIE_LEN && presented.iter().zip(self.raw.iter()).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }
}

impl fmt::Debug for X11Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("X11Cookie").field("raw", &"<redacted>").finish()
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential() -> [u8; COOKIE_LEN] {
        let mut raw = [0u8; COOKIE_LEN];
        for (idx, byte) in raw.iter_mut().enumerate() {
            *byte = idx as u8;
        }
        raw
    }

    #[test]
    fn hex_form_uses_lower_case_nibbles() {
        let cookie = X11Cookie::from_bytes(sequential());
        assert_eq!(cookie.hex(), "000102030405060708090a0b0c0d0e0f");
        let high = X11Cookie::from_bytes([0xff; COOKIE_LEN]);
        assert_eq!(high.hex(), "f".repeat(32));
    }

    #[test]
    fn hex_decodes_back_to_raw_bytes() {
        // Every byte value appears in some nibble position across these cookies.
        for base in (0u16..256).step_by(COOKIE_LEN) {
            let mut raw = [0u8; COOKIE_LEN];
            for (idx, byte) in raw.iter_mut().enumerate() {
                *byte = (base as usize + idx) as u8;
            }
            let cookie = X11Cookie::from_bytes(raw);
            assert_eq!(hex::decode(cookie.hex()).unwrap(), raw.to_vec());
            assert_eq!(X11Cookie::from_hex(cookie.hex()).unwrap(), cookie);
        }
        let random = X11Cookie::generate();
        assert_eq!(X11Cookie::from_hex(random.hex()).unwrap().raw(), random.raw());
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(X11Cookie::from_hex("0001").is_err());
        assert!(X11Cookie::from_hex("zz0102030405060708090a0b0c0d0e0f").is_err());
    }

    #[test]
    fn matches_compares_raw_bytes_only() {
        let cookie = X11Cookie::from_bytes(sequential());
        assert!(cookie.matches(&sequential()));
        assert!(!cookie.matches(cookie.hex().as_bytes()));
        let mut flipped = sequential();
        flipped[7] ^= 0x01;
        assert!(!cookie.matches(&flipped));
        assert!(!cookie.matches(&sequential()[..15]));
    }

    #[test]
    fn debug_output_redacts_cookie() {
        let cookie = X11Cookie::from_bytes(sequential());
        assert!(!format!("{cookie:?}").contains("0001"));
    }
}
