//! Privilege bitmask layout shared by the user store, login pipeline, chat
//! router and bot command table. Bit positions are an internal convention
//! of this core, not a wire format — nothing outside this process reads
//! the raw integer.

pub const NORMAL: i64 = 1 << 0;
pub const PUBLIC: i64 = 1 << 1;
pub const PENDING_VERIFICATION: i64 = 1 << 2;
pub const DONOR: i64 = 1 << 3;
pub const BAT: i64 = 1 << 4;
pub const MODERATOR: i64 = 1 << 5;
pub const ADMIN: i64 = 1 << 6;

pub fn has(privileges: i64, bit: i64) -> bool {
    privileges & bit != 0
}

/// Bits required to pass login: either full normal+public, or a pending
/// verification account (2FA not yet completed).
pub fn passes_login_gate(privileges: i64) -> bool {
    has(privileges, NORMAL) && has(privileges, PUBLIC) || has(privileges, PENDING_VERIFICATION)
}

pub fn is_restricted(privileges: i64) -> bool {
    has(privileges, NORMAL) && !has(privileges, PUBLIC)
}

pub fn is_admin(privileges: i64) -> bool {
    has(privileges, ADMIN)
}

pub fn is_moderator(privileges: i64) -> bool {
    has(privileges, MODERATOR) || is_admin(privileges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_verification_passes_without_public() {
        assert!(passes_login_gate(PENDING_VERIFICATION));
        assert!(!passes_login_gate(NORMAL));
        assert!(passes_login_gate(NORMAL | PUBLIC));
    }
}
