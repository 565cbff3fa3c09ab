//! Passcode generation.

use rand::{rngs::OsRng, Rng};

/// Number of digits in an issued code.
pub const CODE_LENGTH: usize = 4;

/// Produce a fixed-length numeric code, uniform over `[1000, 9999]`.
///
/// Codes are drawn from the OS entropy source so that a code cannot be
/// predicted within its validity window. No side effects, no failure modes.
#[must_use]
pub fn generate_code() -> String {
    let code: u32 = OsRng.gen_range(1000..=9999);
    code.to_string()
}
