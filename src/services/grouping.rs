use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::models::{Channel, ChannelGroup};

/// Case-folded first so "bbc" sorts next to "BBC", raw text breaks the tie
fn collate(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_channels(a: &Channel, b: &Channel) -> Ordering {
    collate(&a.name, &b.name)
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.url.cmp(&b.url))
        .then_with(|| a.logo.cmp(&b.logo))
}

/// Partition channels by `group` label
///
/// Groups are ordered by name and channels within a group by name. Every
/// field takes part in the ordering, so the result depends only on which
/// channels are present, not on their input order.
pub fn group_channels(channels: &[Channel]) -> Vec<ChannelGroup> {
    let mut groups: BTreeMap<(String, String), Vec<Channel>> = BTreeMap::new();
    for channel in channels {
        groups
            .entry((channel.group.to_lowercase(), channel.group.clone()))
            .or_default()
            .push(channel.clone());
    }

    groups
        .into_iter()
        .map(|((_, name), mut members)| {
            members.sort_by(compare_channels);
            ChannelGroup {
                name,
                channels: members,
            }
        })
        .collect()
}
