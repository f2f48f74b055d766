//! HTTP authentication method set.
//!
//! Bit positions match libcurl's `CURLAUTH_*` constants so the set can be
//! handed to any transport that speaks the same bitmask.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// A set of HTTP authentication schemes the transport may negotiate.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthMethods(u32);

impl AuthMethods {
    pub const NONE: AuthMethods = AuthMethods(0);
    pub const BASIC: AuthMethods = AuthMethods(1 << 0);
    pub const DIGEST: AuthMethods = AuthMethods(1 << 1);
    pub const NEGOTIATE: AuthMethods = AuthMethods(1 << 2);
    pub const NTLM: AuthMethods = AuthMethods(1 << 3);
    pub const DIGEST_IE: AuthMethods = AuthMethods(1 << 4);
    pub const NTLM_WB: AuthMethods = AuthMethods(1 << 5);

    /// Every scheme except the IE flavour of digest.
    pub const ANY: AuthMethods = AuthMethods(!Self::DIGEST_IE.0);

    /// Every scheme that never sends the password in the clear.
    pub const ANY_SAFE: AuthMethods = AuthMethods(!(Self::BASIC.0 | Self::DIGEST_IE.0));

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        AuthMethods(bits)
    }

    pub const fn contains(self, other: AuthMethods) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AuthMethods {
    type Output = AuthMethods;

    fn bitor(self, rhs: AuthMethods) -> AuthMethods {
        AuthMethods(self.0 | rhs.0)
    }
}

impl BitOrAssign for AuthMethods {
    fn bitor_assign(&mut self, rhs: AuthMethods) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for AuthMethods {
    type Output = AuthMethods;

    fn bitand(self, rhs: AuthMethods) -> AuthMethods {
        AuthMethods(self.0 & rhs.0)
    }
}

impl Not for AuthMethods {
    type Output = AuthMethods;

    fn not(self) -> AuthMethods {
        AuthMethods(!self.0)
    }
}

impl fmt::Debug for AuthMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(AuthMethods, &str); 6] = [
            (AuthMethods::BASIC, "BASIC"),
            (AuthMethods::DIGEST, "DIGEST"),
            (AuthMethods::NEGOTIATE, "NEGOTIATE"),
            (AuthMethods::NTLM, "NTLM"),
            (AuthMethods::DIGEST_IE, "DIGEST_IE"),
            (AuthMethods::NTLM_WB, "NTLM_WB"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "AuthMethods({:#x}: {})", self.0, names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_excludes_only_digest_ie() {
        assert!(AuthMethods::ANY.contains(AuthMethods::BASIC));
        assert!(AuthMethods::ANY.contains(AuthMethods::DIGEST | AuthMethods::NTLM));
        assert!(!AuthMethods::ANY.contains(AuthMethods::DIGEST_IE));
    }

    #[test]
    fn any_safe_excludes_basic() {
        assert!(!AuthMethods::ANY_SAFE.contains(AuthMethods::BASIC));
        assert!(!AuthMethods::ANY_SAFE.contains(AuthMethods::DIGEST_IE));
        assert!(AuthMethods::ANY_SAFE.contains(AuthMethods::DIGEST));
        assert_eq!(AuthMethods::ANY_SAFE, AuthMethods::ANY & !AuthMethods::BASIC);
    }

    #[test]
    fn bits_match_curl_constants() {
        assert_eq!(AuthMethods::BASIC.bits(), 1);
        assert_eq!(AuthMethods::NTLM.bits(), 8);
        assert_eq!((AuthMethods::BASIC | AuthMethods::DIGEST).bits(), 3);
        assert_eq!(AuthMethods::from_bits(4), AuthMethods::NEGOTIATE);
    }

    #[test]
    fn debug_lists_flag_names() {
        let methods = AuthMethods::BASIC | AuthMethods::NTLM;
        assert_eq!(format!("{methods:?}"), "AuthMethods(0x9: BASIC | NTLM)");
        assert!(AuthMethods::NONE.is_empty());
    }
}
