//! CLI Exit Code Registry
//!
//! Single source of truth for `bovinext` exit codes. Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range | Domain    | Description                              |
//! |-------|-----------|------------------------------------------|
//! | 0     | Universal | Success                                  |
//! | 1     | Universal | General error (unspecified)              |
//! | 2     | Universal | CLI usage error (bad args, missing file) |
//! | 3-9   | input     | Config and input file problems           |
//! | 10-19 | domain    | Rejected by the settlement/wallet rules  |
//! | 20-29 | serve     | Server startup and runtime               |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Update the table above
//! 3. Wire it into `CliError`

use bovinext_core::{CoreError, ErrorKind};

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Input (3-9)
// =============================================================================

/// Settings file unreadable, unparsable or invalid.
pub const EXIT_CONFIG: u8 = 3;

/// Input file could not be read.
pub const EXIT_IO: u8 = 4;

/// Input file is not the expected JSON shape.
pub const EXIT_PARSE: u8 = 5;

// =============================================================================
// Domain (10-19)
// =============================================================================

/// Input rejected by validation (negative weight, non-positive amount, ...).
pub const EXIT_VALIDATION: u8 = 10;

/// Unknown packer, category, animal or wallet.
pub const EXIT_NOT_FOUND: u8 = 11;

/// Credentials missing or rejected.
pub const EXIT_UNAUTHORIZED: u8 = 12;

/// Store, identity provider or ledger failed.
pub const EXIT_DEPENDENCY: u8 = 13;

// =============================================================================
// Serve (20-29)
// =============================================================================

/// Could not bind the listen address.
pub const EXIT_SERVE_BIND: u8 = 20;

/// Runtime or listener failed after startup.
pub const EXIT_SERVE_RUNTIME: u8 = 21;

/// Map a core error to its exit code.
pub fn core_exit_code(err: &CoreError) -> u8 {
    match err.kind() {
        ErrorKind::Validation => EXIT_VALIDATION,
        ErrorKind::NotFound => EXIT_NOT_FOUND,
        ErrorKind::Unauthorized => EXIT_UNAUTHORIZED,
        ErrorKind::Dependency => EXIT_DEPENDENCY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_domain_range() {
        assert_eq!(core_exit_code(&CoreError::validation("x")), EXIT_VALIDATION);
        assert_eq!(core_exit_code(&CoreError::NotFound("x".into())), EXIT_NOT_FOUND);
        assert_eq!(core_exit_code(&CoreError::Unauthorized("x".into())), EXIT_UNAUTHORIZED);
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS, EXIT_ERROR, EXIT_USAGE, EXIT_CONFIG, EXIT_IO, EXIT_PARSE,
            EXIT_VALIDATION, EXIT_NOT_FOUND, EXIT_UNAUTHORIZED, EXIT_DEPENDENCY,
            EXIT_SERVE_BIND, EXIT_SERVE_RUNTIME,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
