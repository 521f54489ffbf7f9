/// Configuration default values
///
/// All defaults in one place so they are easy to change.

// Source endpoints
pub const DEFAULT_PLAYLIST_URL: &str = "https://bit.ly/tta-m3u";
pub const DEFAULT_GUIDE_URL: &str = "https://bit.ly/tta-epg";

// Fetch defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FETCH_MAX_RETRIES: u32 = 5;
pub const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 10_000;
pub const DEFAULT_ACCEPT: &str = "*/*";
pub const DEFAULT_ORIGIN: &str = "http://localhost";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Forwarding proxies, most reliable first
pub const DEFAULT_PROXIES: &[&str] = &[
    "https://corsproxy.io/?",
    "https://api.allorigins.win/raw?url=",
    "https://api.codetabs.com/v1/proxy?quest=",
    "https://cors.eu.org/",
    "https://proxy.cors.sh/",
];

// Guide parsing defaults
pub const DEFAULT_GUIDE_PARSE_ATTEMPTS: u32 = 3;
pub const DEFAULT_GUIDE_PARSE_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_GUIDE_ACCEPT: &str = "application/xml, text/xml, */*";

// Loader defaults
pub const DEFAULT_PLAYLIST_RETRIES: u32 = 3;
pub const DEFAULT_PLAYLIST_RETRY_DELAY_SECS: u64 = 5;
