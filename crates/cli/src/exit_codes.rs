//! CLI Exit Code Registry
//!
//! Single source of truth for `otd` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                      |
//! |------|--------------------------------------------------------------|
//! | 0    | Success                                                      |
//! | 2    | Usage error (bad arguments, unknown dimension)               |
//! | 3    | Invalid config (TOML syntax, unknown key, failed validation) |
//! | 4    | Runtime error (unreadable file, missing column, bad export)  |
//! | 5    | Insufficient data (empty selection, untestable association)  |
//! | 6    | Data-quality issues found with `--strict`                    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Map it in [`recon_exit_code`] if it comes from the engine

use otd_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be parsed or failed validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Source files could not be read or decoded.
pub const EXIT_RUNTIME: u8 = 4;

/// Nothing left to analyse, or the association test is undefined.
pub const EXIT_INSUFFICIENT_DATA: u8 = 5;

/// `--strict` run found data-quality issues. Results are still written.
pub const EXIT_DATA_QUALITY: u8 = 6;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        ReconError::MissingColumn { .. }
        | ReconError::ColumnLengthMismatch { .. }
        | ReconError::UnsupportedJson { .. }
        | ReconError::Decode { .. }
        | ReconError::Io(_) => EXIT_RUNTIME,
        ReconError::InsufficientData(_) => EXIT_INSUFFICIENT_DATA,
    }
}
