//! CLI Exit Code Registry
//!
//! Single source of truth for `shipmatch` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success, every shipment matched                           |
//! | 1    | Run completed but some shipments are unmatched            |
//! | 2    | Usage error (bad arguments, bad date range)               |
//! | 3    | Config invalid (parse or validation failure)              |
//! | 4    | Runtime error (unreadable file, customer run failed)      |
//!
//! A failed customer outranks unmatched shipments: when both occur the
//! exit code is 4.

/// Success - every shipment of every customer matched.
pub const EXIT_SUCCESS: u8 = 0;

/// Unmatched shipments remain. Like `diff(1)`, exit 1 means "differences found".
pub const EXIT_UNMATCHED: u8 = 1;

/// Usage error - bad arguments, inverted date window.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate.
pub const EXIT_CONFIG_INVALID: u8 = 3;

/// I/O failure, source failure, or at least one customer failed.
pub const EXIT_RUNTIME: u8 = 4;
