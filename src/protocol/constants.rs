//! Protocol constants

/// Prefix that marks a user identity (`@alice`)
pub const IDENTITY_PREFIX: u8 = b'@';

/// Prefix that marks a channel name (`#general`)
pub const CHANNEL_PREFIX: u8 = b'#';

/// Default TCP port
pub const DEFAULT_PORT: u16 = 8081;

/// Maximum length of a command line (excluding message bodies)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4 * 1024;

/// Maximum declared length of a `MSG` body
pub const DEFAULT_MAX_BODY_LENGTH: usize = 64 * 1024;

/// Acknowledgement line
pub const REPLY_OK: &[u8] = b"OK\n";

/// Prefix of an error line
pub const REPLY_ERR_PREFIX: &[u8] = b"ERR ";

/// Separator between sender and body in a channel broadcast
pub const CHANNEL_SEPARATOR: &[u8] = b": ";
