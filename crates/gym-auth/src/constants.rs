//! Gym API auth constants
//!
//! Endpoint paths are relative to the configured base URL. The storage keys
//! name the two entries of the persisted session document and must stay
//! stable across releases, or signed-in users are logged out on upgrade.

/// Sign-in endpoint: email + password in, tokens + user out
pub const SIGN_IN_PATH: &str = "/sessions";

/// Refresh endpoint: refresh token in, new token pair out
pub const REFRESH_PATH: &str = "/refresh-token";

/// Storage key holding the serialized credential pair
pub const CREDENTIAL_KEY: &str = "@gym:credential";

/// Storage key holding the serialized user profile
pub const USER_KEY: &str = "@gym:user";
