//! Utility modules shared by the fetcher and both parsers

pub mod url;
pub mod xmltv_time;

pub use self::url::UrlUtils;
pub use xmltv_time::{parse_flexible, parse_xmltv_datetime};
