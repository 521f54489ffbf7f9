//! M3U / M3U8 playlist parsing
//!
//! Parsing is a line-oriented state machine: an `#EXTINF:` line opens a
//! pending entry, the next line that starts with a URL scheme closes it.
//! Malformed entries are dropped one at a time and never abort the file.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::errors::{EntryRejection, PlaylistError};
use crate::models::{Channel, Playlist, DEFAULT_CHANNEL_NAME, DEFAULT_GROUP};
use crate::utils::UrlUtils;

const HEADER_MARKER: &str = "#EXTM3U";
const EXTINF_PREFIX: &str = "#EXTINF:";

/// Where a channel field may take its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldSource {
    /// A quoted `key="value"` attribute on the `#EXTINF` line
    Attribute(&'static str),
    /// Text after the first unquoted comma
    DisplayName,
    /// 1-based position of the entry in the output
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelField {
    Id,
    Name,
    Logo,
    Group,
}

/// Sources tried in order; the first non-empty one wins, else `default`
struct FieldRule {
    field: ChannelField,
    sources: &'static [FieldSource],
    default: &'static str,
}

const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        field: ChannelField::Id,
        sources: &[FieldSource::Attribute("tvg-id"), FieldSource::Position],
        default: "",
    },
    FieldRule {
        field: ChannelField::Name,
        sources: &[FieldSource::Attribute("tvg-name"), FieldSource::DisplayName],
        default: DEFAULT_CHANNEL_NAME,
    },
    FieldRule {
        field: ChannelField::Logo,
        sources: &[FieldSource::Attribute("tvg-logo")],
        default: "",
    },
    FieldRule {
        field: ChannelField::Group,
        sources: &[FieldSource::Attribute("group-title")],
        default: DEFAULT_GROUP,
    },
];

/// Header attributes that may advertise a guide location
const GUIDE_URL_ATTRIBUTES: &[&str] = &["x-tvg-url", "url-tvg"];

fn attribute_pattern() -> &'static Regex {
    static ATTRIBUTE: OnceLock<Regex> = OnceLock::new();
    ATTRIBUTE.get_or_init(|| {
        Regex::new(r#"([A-Za-z0-9_\-]+)="([^"]*)""#).expect("static attribute regex")
    })
}

/// Metadata collected from an `#EXTINF` line, waiting for its stream URL
#[derive(Debug, Default)]
struct PendingEntry {
    attributes: HashMap<String, String>,
    display_name: Option<String>,
}

impl PendingEntry {
    fn lookup(&self, source: FieldSource, position: usize) -> Option<String> {
        let value = match source {
            FieldSource::Attribute(key) => self.attributes.get(key).cloned(),
            FieldSource::DisplayName => self.display_name.clone(),
            FieldSource::Position => Some(position.to_string()),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    fn resolve(&self, field: ChannelField, position: usize) -> String {
        FIELD_RULES
            .iter()
            .find(|rule| rule.field == field)
            .map(|rule| {
                rule.sources
                    .iter()
                    .find_map(|source| self.lookup(*source, position))
                    .unwrap_or_else(|| rule.default.to_string())
            })
            .unwrap_or_default()
    }

    fn into_channel(self, url: String, position: usize) -> Channel {
        Channel {
            id: self.resolve(ChannelField::Id, position),
            name: self.resolve(ChannelField::Name, position),
            logo: self.resolve(ChannelField::Logo, position),
            group: self.resolve(ChannelField::Group, position),
            url,
        }
    }
}

/// Split the text after `#EXTINF:` into its attribute section and display
/// name at the first comma outside quotes
///
/// Returns `None` when a quote is left open.
fn split_metadata(metadata: &str) -> Option<(&str, Option<&str>)> {
    let mut in_quotes = false;
    for (i, ch) in metadata.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                let name = metadata[i + 1..].trim();
                return Some((&metadata[..i], Some(name).filter(|n| !n.is_empty())));
            }
            _ => {}
        }
    }

    if in_quotes {
        None
    } else {
        Some((metadata, None))
    }
}

fn parse_attributes(section: &str) -> HashMap<String, String> {
    attribute_pattern()
        .captures_iter(section)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps.get(2)?.as_str().trim().to_string();
            Some((key, value))
        })
        .collect()
}

fn parse_extinf(line: &str) -> Option<PendingEntry> {
    let metadata = line.strip_prefix(EXTINF_PREFIX)?;
    let (section, display_name) = split_metadata(metadata)?;

    Some(PendingEntry {
        attributes: parse_attributes(section),
        display_name: display_name.map(str::to_string),
    })
}

fn extract_guide_url(header: &str) -> Option<String> {
    let attributes = parse_attributes(header);
    GUIDE_URL_ATTRIBUTES
        .iter()
        .filter_map(|key| attributes.get(*key))
        // Some providers list several guides separated by commas
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .find(|candidate| UrlUtils::is_valid(candidate))
        .map(str::to_string)
}

/// Parse playlist text into channels plus header metadata
pub fn parse_playlist(text: &str) -> Result<Playlist, PlaylistError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    if text.trim().is_empty() {
        return Err(PlaylistError::Empty);
    }

    if !text.contains(HEADER_MARKER) {
        return Err(PlaylistError::MissingHeader);
    }

    let mut channels: Vec<Channel> = Vec::new();
    let mut guide_url = None;
    let mut pending: Option<PendingEntry> = None;
    let mut rejected = 0usize;

    let lines = text
        .split('\n')
        .map(|line| line.trim())
        .enumerate()
        .filter(|(_, line)| !line.is_empty());

    for (index, line) in lines {
        let line_number = index + 1;

        if line.starts_with(EXTINF_PREFIX) {
            if pending.is_some() {
                debug!("Discarding metadata without stream URL before line {}", line_number);
            }
            pending = parse_extinf(line);
            if pending.is_none() {
                rejected += 1;
                debug!("Skipping entry: {}", EntryRejection::MalformedMetadata { line: line_number });
            }
        } else if UrlUtils::has_scheme_prefix(line) {
            let entry = pending.take().unwrap_or_default();
            match UrlUtils::validate_stream_url(line) {
                Ok(_) => {
                    let position = channels.len() + 1;
                    channels.push(entry.into_channel(line.to_string(), position));
                }
                Err(e) => {
                    rejected += 1;
                    debug!(
                        "Skipping entry: {}",
                        EntryRejection::InvalidUrl {
                            line: line_number,
                            reason: e.to_string(),
                        }
                    );
                }
            }
        } else if guide_url.is_none() && line.starts_with(HEADER_MARKER) {
            guide_url = extract_guide_url(line);
        }
    }

    if channels.is_empty() {
        return Err(PlaylistError::NoChannels);
    }

    info!(
        "Parsed {} channels from playlist ({} entries rejected)",
        channels.len(),
        rejected
    );

    Ok(Playlist { channels, guide_url })
}

/// Parse playlist text into channels only
pub fn parse_channels(text: &str) -> Result<Vec<Channel>, PlaylistError> {
    parse_playlist(text).map(|playlist| playlist.channels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_entry_uses_display_name() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"1\" group-title=\"News\",CNN\nhttp://example.com/cnn.m3u8\n";
        let channels = parse_channels(text).unwrap();

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, "1");
        assert_eq!(channels[0].name, "CNN");
        assert_eq!(channels[0].group, "News");
        assert_eq!(channels[0].url, "http://example.com/cnn.m3u8");
        assert_eq!(channels[0].logo, "");
    }

    #[test]
    fn test_single_entry_with_all_attributes() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"cnn\" tvg-name=\"CNN\" tvg-logo=\"http://l/cnn.png\" group-title=\"News\",CNN\nhttp://s/cnn.m3u8\n";
        let channels = parse_channels(text).unwrap();

        assert_eq!(
            channels,
            vec![Channel {
                id: "cnn".to_string(),
                name: "CNN".to_string(),
                logo: "http://l/cnn.png".to_string(),
                url: "http://s/cnn.m3u8".to_string(),
                group: "News".to_string(),
            }]
        );
    }

    #[test]
    fn test_fallbacks_to_display_name_and_position() {
        let text = "#EXTM3U\r\n\r\n#EXTINF:-1,BBC One HD\r\nhttps://s/bbc1\r\n#EXTINF:-1 tvg-id=\"\" tvg-name=\"\",\r\nhttps://s/unnamed\r\n";
        let channels = parse_channels(text).unwrap();

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].id, "1");
        assert_eq!(channels[0].name, "BBC One HD");
        assert_eq!(channels[0].group, DEFAULT_GROUP);
        assert_eq!(channels[0].logo, "");
        assert_eq!(channels[1].id, "2");
        assert_eq!(channels[1].name, DEFAULT_CHANNEL_NAME);
    }

    #[test]
    fn test_display_name_may_contain_commas() {
        let text = "#EXTM3U\n#EXTINF:-1 group-title=\"News, Local\",Channel 5, Evening\nhttp://s/5\n";
        let channels = parse_channels(text).unwrap();

        assert_eq!(channels[0].group, "News, Local");
        assert_eq!(channels[0].name, "Channel 5, Evening");
    }

    #[test]
    fn test_second_metadata_line_replaces_pending() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"a\",A\n#EXTINF:-1 tvg-id=\"b\",B\nhttp://s/b\n";
        let channels = parse_channels(text).unwrap();

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, "b");
        assert_eq!(channels[0].name, "B");
    }

    #[test]
    fn test_invalid_url_dropped_and_slot_cleared() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"bad\",Bad\nhttp://exa mple.com/x\nhttp://s/after\n#EXTINF:-1 tvg-id=\"good\",Good\nhttp://s/good\n";
        let channels = parse_channels(text).unwrap();

        assert_eq!(channels.len(), 2);
        // The line after the rejected URL gets defaults, not the "bad" metadata
        assert_eq!(channels[0].url, "http://s/after");
        assert_eq!(channels[0].id, "1");
        assert_eq!(channels[0].name, DEFAULT_CHANNEL_NAME);
        assert_eq!(channels[1].id, "good");
        assert!(channels.iter().all(|c| UrlUtils::is_valid(&c.url)));
    }

    #[test]
    fn test_malformed_metadata_discards_pending_slot() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-id=\"x,X\nhttp://s/x\n#EXTINF:-1 tvg-id=\"y\",Y\nhttp://s/y\n";
        let channels = parse_channels(text).unwrap();

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].id, "1");
        assert_eq!(channels[0].name, DEFAULT_CHANNEL_NAME);
        assert_eq!(channels[1].id, "y");
    }

    #[test]
    fn test_other_lines_ignored() {
        let text = "#EXTM3U\n#EXTVLCOPT:http-user-agent=Foo\n#EXTINF:-1,Radio\n#EXTGRP:Music\nrtmp://s/radio\nnot a url\n";
        let channels = parse_channels(text).unwrap();

        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Radio");
        assert_eq!(channels[0].url, "rtmp://s/radio");
    }

    #[test]
    fn test_empty_and_missing_header() {
        assert_eq!(parse_channels(""), Err(PlaylistError::Empty));
        assert_eq!(parse_channels("  \n\t\n"), Err(PlaylistError::Empty));
        assert_eq!(
            parse_channels("#EXTINF:-1,A\nhttp://s/a\n"),
            Err(PlaylistError::MissingHeader)
        );
    }

    #[test]
    fn test_zero_valid_channels() {
        assert_eq!(parse_channels("#EXTM3U\n"), Err(PlaylistError::NoChannels));
        assert_eq!(
            parse_channels("#EXTM3U\n#EXTINF:-1,A\nhttp://[broken\n"),
            Err(PlaylistError::NoChannels)
        );
    }

    #[test]
    fn test_header_guide_url_and_bom() {
        let text = "\u{feff}#EXTM3U x-tvg-url=\"not-a-url, https://epg.example/guide.xml\"\n#EXTINF:-1,A\nhttp://s/a\n";
        let playlist = parse_playlist(text).unwrap();

        assert_eq!(playlist.guide_url.as_deref(), Some("https://epg.example/guide.xml"));
        assert_eq!(playlist.channels.len(), 1);

        let without = parse_playlist("#EXTM3U\n#EXTINF:-1,A\nhttp://s/a\n").unwrap();
        assert_eq!(without.guide_url, None);
    }

    #[test]
    fn test_split_metadata_quote_balance() {
        assert_eq!(
            split_metadata("-1 a=\"1,2\",Name"),
            Some(("-1 a=\"1,2\"", Some("Name")))
        );
        assert_eq!(split_metadata("-1 a=\"open,Name"), None);
        assert_eq!(split_metadata("-1"), Some(("-1", None)));
    }
}
