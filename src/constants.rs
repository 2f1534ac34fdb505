//! Defaults shared by the config layer and the submission pipeline

// Redirect resolution
pub const DEFAULT_MAX_HOPS: usize = 8;
pub const DEFAULT_USER_AGENT: &str = concat!("phishblock/", env!("CARGO_PKG_VERSION"));

// Rate limiting
pub const DEFAULT_MAX_REPORTS_PER_WINDOW: u64 = 6;
pub const DEFAULT_WINDOW_SECONDS: u64 = 60 * 60;
pub const MAX_WINDOW_SECONDS: u64 = 10 * 366 * 24 * 60 * 60;

// Pinning
pub const PINATA_PIN_JSON_URL: &str = "https://api.pinata.cloud/pinning/pinJSONToIPFS";
pub const PINATA_API_KEY_ENV: &str = "PINATA_API_KEY";
pub const PINATA_API_SECRET_ENV: &str = "PINATA_API_SECRET";
pub const DEFAULT_PIN_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_SOURCE_TAG: &str = "phishblock";

// Reports
pub const TARGET_TYPE_URL: &str = "url";
pub const LIST_REPORTS_LIMIT: usize = 50;

// Trusted identity headers set by the authenticating proxy
pub const HEADER_AUTH_PROVIDER: &str = "x-auth-provider";
pub const HEADER_AUTH_PROVIDER_ID: &str = "x-auth-provider-id";
pub const HEADER_AUTH_NAME: &str = "x-auth-name";
pub const HEADER_AUTH_EMAIL: &str = "x-auth-email";
pub const HEADER_AUTH_AVATAR: &str = "x-auth-avatar";
