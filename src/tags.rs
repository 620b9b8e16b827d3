use crate::models::MessageId;
use std::collections::{BTreeSet, HashMap};

/// Per-message labels plus the palette offered by the tag overlay.
///
/// Tags are keyed by message id only. When a later fetch no longer contains an id
/// its tags stay here unreachable; a later message reusing the id sees them again.
#[derive(Debug, Clone, Default)]
pub struct TagStore {
    palette: Vec<String>,
    assigned: HashMap<MessageId, BTreeSet<String>>,
}

fn normalize(tag: &str) -> Option<&str> {
    let tag = tag.trim();
    (!tag.is_empty()).then_some(tag)
}

impl TagStore {
    pub fn new(predefined: impl IntoIterator<Item = String>) -> Self {
        let mut store = Self::default();
        for tag in predefined {
            store.add_custom_tag(&tag);
        }
        store
    }

    /// Returns `true` if the tag was not already on the message.
    pub fn add_tag(&mut self, message_id: MessageId, tag: &str) -> bool {
        let Some(tag) = normalize(tag) else {
            return false;
        };
        self.assigned
            .entry(message_id)
            .or_default()
            .insert(tag.to_string())
    }

    /// Returns `true` if the tag was present.
    pub fn remove_tag(&mut self, message_id: MessageId, tag: &str) -> bool {
        let Some(tag) = normalize(tag) else {
            return false;
        };
        let Some(set) = self.assigned.get_mut(&message_id) else {
            return false;
        };
        let removed = set.remove(tag);
        if set.is_empty() {
            self.assigned.remove(&message_id);
        }
        removed
    }

    /// Adds the tag if missing, otherwise removes it. Returns whether the tag is now set.
    pub fn toggle_tag(&mut self, message_id: MessageId, tag: &str) -> bool {
        if self.has_tag(message_id, tag) {
            self.remove_tag(message_id, tag);
            false
        } else {
            self.add_tag(message_id, tag)
        }
    }

    /// Extends the palette. Does not tag any message.
    pub fn add_custom_tag(&mut self, tag: &str) -> bool {
        let Some(tag) = normalize(tag) else {
            return false;
        };
        if self.palette.iter().any(|t| t == tag) {
            return false;
        }
        self.palette.push(tag.to_string());
        true
    }

    pub fn has_tag(&self, message_id: MessageId, tag: &str) -> bool {
        normalize(tag).is_some_and(|tag| {
            self.assigned
                .get(&message_id)
                .is_some_and(|set| set.contains(tag))
        })
    }

    pub fn tags_for(&self, message_id: MessageId) -> Vec<String> {
        self.assigned
            .get(&message_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn palette(&self) -> &[String] {
        &self.palette
    }
}
