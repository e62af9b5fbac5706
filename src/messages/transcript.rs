//! Ordering and date grouping of a conversation's messages.

use std::collections::BTreeMap;

use serde::Serialize;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::{
    format::{date_label, local_date, time_of_day},
    model::Message,
};

/// A contiguous run of messages sent on the same local calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup {
    pub date: Date,
    pub label: String,
    pub messages: Vec<Message>,
}

/// Partitions `messages` into date groups in one left-to-right pass.
///
/// The input is expected in transcript order and is not re-sorted: a message
/// joins the last group when it shares that group's first message's date,
/// otherwise it opens a new group. Concatenating the groups gives back the input.
pub fn group_by_date(messages: &[Message], offset: UtcOffset, today: Date) -> Vec<DateGroup> {
    let mut groups: Vec<DateGroup> = Vec::new();

    for message in messages {
        let date = local_date(message.sent_at, offset);
        match groups.last_mut() {
            Some(group) if group.date == date => group.messages.push(message.clone()),
            _ => groups.push(DateGroup {
                date,
                label: date_label(date, today),
                messages: vec![message.clone()],
            }),
        }
    }

    groups
}

/// Folds a server snapshot into the held sequence.
///
/// Messages are keyed by id with the incoming copy winning, and the result is
/// ordered by `(sent_at, id)`. Nothing already held is dropped, so a late or
/// stale snapshot cannot hide a message that was appended after a send.
pub fn merge_messages(held: &[Message], incoming: Vec<Message>) -> Vec<Message> {
    let mut by_id: BTreeMap<i64, Message> = held.iter().map(|m| (m.id, m.clone())).collect();
    for message in incoming {
        by_id.insert(message.id, message);
    }

    let mut merged: Vec<Message> = by_id.into_values().collect();
    merged.sort_by_key(Message::order_key);
    merged
}

/// What the browser renders for one message bubble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub sender_username: String,
    pub content: String,
    pub time: String,
    pub mine: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateGroupView {
    pub label: String,
    pub messages: Vec<MessageView>,
}

impl DateGroupView {
    pub fn render(group: &DateGroup, viewer_id: i64, offset: UtcOffset) -> Self {
        Self {
            label: group.label.clone(),
            messages: group
                .messages
                .iter()
                .map(|m| MessageView {
                    id: m.id,
                    sender_username: m.sender_username.clone(),
                    content: m.content.clone(),
                    time: time_of_day(m.sent_at, offset),
                    mine: m.sender_id == viewer_id,
                })
                .collect(),
        }
    }
}

/// Groups and renders `messages` as seen by `viewer_id` at `now`.
pub fn render_groups(messages: &[Message], viewer_id: i64, offset: UtcOffset, now: OffsetDateTime) -> Vec<DateGroupView> {
    group_by_date(messages, offset, local_date(now, offset))
        .iter()
        .map(|group| DateGroupView::render(group, viewer_id, offset))
        .collect()
}
