//! Format parsers for playlists and program guides

pub mod epg_parser;
pub mod m3u_parser;
pub mod xmltv_tree;

pub use epg_parser::{parse_guide_document, GuideParser};
pub use m3u_parser::{parse_channels, parse_playlist};
pub use xmltv_tree::{XmlNode, XmlTreeError};
