//! XMLTV guide parsing
//!
//! The guide is an optional enhancement, so [`GuideParser::parse`] never
//! fails: structural problems produce an empty program list and individual
//! bad entries are skipped.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Months, Utc};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::xmltv_tree::{parse_document, XmlNode};
use crate::config::GuideConfig;
use crate::errors::{EntryRejection, GuideError};
use crate::fetch::{Sleeper, TokioSleeper};
use crate::models::Program;
use crate::utils::parse_xmltv_datetime;

const ROOT_ELEMENT: &str = "tv";
const PROGRAMME_ELEMENT: &str = "programme";

fn root_tag_pattern() -> &'static Regex {
    static ROOT_TAG: OnceLock<Regex> = OnceLock::new();
    ROOT_TAG.get_or_init(|| Regex::new(r"<tv[\s>/]").expect("static root tag regex"))
}

/// Cheap pre-check before any structural parse
fn looks_like_xmltv(text: &str) -> bool {
    text.contains("<?xml") || root_tag_pattern().is_match(text)
}

fn parse_tv_root(text: &str) -> Result<XmlNode, String> {
    let root = parse_document(text).map_err(|e| e.message)?;
    if root.name != ROOT_ELEMENT {
        return Err(format!("Missing root {ROOT_ELEMENT} element (found <{}>)", root.name));
    }
    Ok(root)
}

/// Required field from an attribute, or a same-named child element
fn required_field(node: &XmlNode, name: &'static str) -> Result<String, EntryRejection> {
    node.attribute(name)
        .map(|v| v.trim().to_string())
        .or_else(|| node.child(name).map(XmlNode::text_content))
        .filter(|v| !v.is_empty())
        .ok_or(EntryRejection::MissingAttribute { attribute: name })
}

/// Every occurrence of a text element (e.g. one per language), joined
fn text_field(node: &XmlNode, name: &str) -> String {
    node.children_named(name)
        .map(XmlNode::text_content)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_time(raw: &str, attribute: &'static str) -> Result<DateTime<Utc>, EntryRejection> {
    parse_xmltv_datetime(raw).map_err(|error| EntryRejection::InvalidTime { attribute, error })
}

/// Validate one `programme` element against the window around `now`
fn to_program(node: &XmlNode, now: DateTime<Utc>) -> Result<Program, EntryRejection> {
    let raw_start = required_field(node, "start")?;
    let raw_stop = required_field(node, "stop")?;
    let channel = required_field(node, "channel")?;

    let start = parse_time(&raw_start, "start")?;
    let end = parse_time(&raw_stop, "stop")?;

    if end <= start {
        return Err(EntryRejection::NonPositiveDuration);
    }

    let earliest = now
        .checked_sub_months(Months::new(12))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let latest = now
        .checked_add_months(Months::new(12))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    if start < earliest || end > latest {
        return Err(EntryRejection::OutOfWindow);
    }

    let title = text_field(node, "title");
    if title.is_empty() {
        return Err(EntryRejection::EmptyTitle);
    }

    Ok(Program {
        id: format!("{channel}-{raw_start}"),
        title,
        description: text_field(node, "desc"),
        start,
        end,
        channel_id: channel,
    })
}

/// Validated programs from a parsed `tv` root, ascending by start
pub fn extract_programs(root: &XmlNode, now: DateTime<Utc>) -> Vec<Program> {
    let mut rejected = 0usize;
    let mut programs: Vec<Program> = root
        .children_named(PROGRAMME_ELEMENT)
        .filter_map(|node| match to_program(node, now) {
            Ok(program) => Some(program),
            Err(rejection) => {
                rejected += 1;
                debug!(
                    "Skipping programme on channel {:?}: {}",
                    node.attribute("channel").unwrap_or_default(),
                    rejection
                );
                None
            }
        })
        .collect();

    // Stable: entries sharing a start keep document order
    programs.sort_by_key(|p| p.start);

    if rejected > 0 {
        debug!("Rejected {} programme entries", rejected);
    }
    programs
}

/// Single-attempt guide parse
pub fn parse_guide_document(text: &str, now: DateTime<Utc>) -> Result<Vec<Program>, GuideError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if !looks_like_xmltv(text) {
        return Err(GuideError::NotXml);
    }

    let root = parse_tv_root(text).map_err(|message| GuideError::Structure { attempts: 1, message })?;
    Ok(extract_programs(&root, now))
}

/// Guide parser with bounded structural-parse retries
pub struct GuideParser {
    attempts: u32,
    base_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl GuideParser {
    pub fn new(config: &GuideConfig) -> Self {
        Self {
            attempts: config.parse_attempts.max(1),
            base_delay: config.parse_retry_delay,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Parse a guide, returning an empty list on any unrecoverable problem
    pub async fn parse(
        &self,
        text: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Vec<Program> {
        match self.try_parse(text, now, cancel).await {
            Ok(programs) => programs,
            Err(e) => {
                warn!("Guide parsing failed, continuing without programs: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`GuideParser::parse`] but reports why nothing was produced
    pub async fn try_parse(
        &self,
        text: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Program>, GuideError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            warn!("Empty guide data received");
            return Ok(Vec::new());
        }

        if !looks_like_xmltv(text) {
            return Err(GuideError::NotXml);
        }

        let root = self.parse_with_retry(text, cancel).await?;
        let programs = extract_programs(&root, now);
        info!("Parsed {} programs from guide", programs.len());
        Ok(programs)
    }

    async fn parse_with_retry(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<XmlNode, GuideError> {
        let mut attempt = 0;
        loop {
            let message = match parse_tv_root(text) {
                Ok(root) => return Ok(root),
                Err(message) => message,
            };

            attempt += 1;
            warn!("Guide XML parse attempt {} failed: {}", attempt, message);
            if attempt >= self.attempts {
                return Err(GuideError::Structure {
                    attempts: self.attempts,
                    message,
                });
            }

            let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GuideError::Cancelled),
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }
}
