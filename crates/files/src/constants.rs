//! Constants for artifact handling.

/// Suffix appended by tools that write gzip-compressed volumes.
pub const GZ_SUFFIX: &str = ".gz";

/// Number of leading bytes read for gzip magic and media type detection.
pub(crate) const SNIFF_LEN: usize = 8192;
