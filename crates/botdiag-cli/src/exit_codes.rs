//! Exit codes of the `botdiag` binary. Part of the public contract.

/// Archive written (phases may still have collected less than asked).
pub const EXIT_SUCCESS: i32 = 0;
/// The archive could not be written.
pub const EXIT_ARCHIVE_FAILED: i32 = 1;
/// Invalid arguments or configuration; nothing was collected.
pub const EXIT_CONFIG_ERROR: i32 = 2;
