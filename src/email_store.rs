use crate::error::ApiError;
use crate::models::{Folder, Message, MessageId};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
}

/// Messages for the current (folder, company) pair.
///
/// Each load is tagged with a sequence number; only the response to the most
/// recently issued load is applied.
#[derive(Debug, Clone, Default)]
pub struct EmailStore {
    messages: Vec<Message>,
    selected: Option<MessageId>,
    state: LoadState,
    latest_seq: u64,
}

/// Only the Inbox is wired to real data, and only once a company is chosen.
pub fn should_fetch(folder: &Folder, company_id: Option<&str>) -> bool {
    folder.is_inbox() && company_id.is_some()
}

impl EmailStore {
    /// Starts a load cycle for `(folder, company_id)` and returns its sequence
    /// number, or settles to an empty list when that pair has nothing to fetch.
    pub fn request(&mut self, folder: &Folder, company_id: Option<&str>) -> Option<u64> {
        if should_fetch(folder, company_id) {
            Some(self.begin_load())
        } else {
            self.invalidate();
            None
        }
    }

    /// One-shot load: begins a cycle, awaits the backend, applies the result.
    #[cfg(test)]
    pub async fn load(
        &mut self,
        backend: &dyn crate::api::MailBackend,
        folder: &Folder,
        company_id: Option<&str>,
    ) -> Result<(), ApiError> {
        let (Some(seq), Some(company_id)) = (self.request(folder, company_id), company_id) else {
            return Ok(());
        };

        let result = backend.list_emails(company_id).await;
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.clone());
        self.finish_load(seq, result);
        outcome
    }

    /// Enters `Loading`, dropping the visible list and selection.
    pub fn begin_load(&mut self) -> u64 {
        self.latest_seq += 1;
        self.state = LoadState::Loading;
        self.messages.clear();
        self.selected = None;
        debug!(seq = self.latest_seq, "Email load started");
        self.latest_seq
    }

    /// Applies a load result. Returns `false` when the response is stale and was ignored.
    pub fn finish_load(&mut self, seq: u64, result: Result<Vec<Message>, ApiError>) -> bool {
        if seq != self.latest_seq || self.state != LoadState::Loading {
            debug!(seq, latest = self.latest_seq, "Dropping stale email response");
            return false;
        }

        self.messages = match result {
            Ok(messages) => messages,
            Err(e) => {
                warn!("Email load failed: {}", e);
                Vec::new()
            }
        };
        self.selected = self.messages.first().map(|m| m.id);
        self.state = LoadState::Loaded;
        debug!(seq, count = self.messages.len(), "Email load finished");
        true
    }

    /// Empty, settled, and any in-flight response is now stale.
    pub fn invalidate(&mut self) {
        self.latest_seq += 1;
        self.messages.clear();
        self.selected = None;
        self.state = LoadState::Loaded;
    }

    /// Messages whose sender, subject or preview contain `search_text`, ignoring case.
    pub fn filter(&self, search_text: &str) -> Vec<&Message> {
        let needle = search_text.to_lowercase();
        self.messages
            .iter()
            .filter(|m| {
                needle.is_empty()
                    || m.sender.to_lowercase().contains(&needle)
                    || m.subject.to_lowercase().contains(&needle)
                    || m.body_preview.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Selects `id` if it is part of the current set; otherwise nothing changes.
    pub fn select(&mut self, id: MessageId) -> bool {
        if self.messages.iter().any(|m| m.id == id) {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    pub fn selected_id(&self) -> Option<MessageId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&Message> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    #[cfg(test)]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn unread_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_unread).count()
    }

    #[cfg(test)]
    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }
}
