//! Selection state machine.
//!
//! User actions mutate the selection and return [`Effect`]s. The caller runs the
//! effects (see [`execute`]) and feeds each [`Outcome`] back through
//! [`SelectionController::apply`]. Nothing in here awaits.

use crate::api::MailBackend;
use crate::config::Config;
use crate::directory::DirectoryLookup;
use crate::email_store::EmailStore;
use crate::error::ApiError;
use crate::models::{Company, Folder, Message, MessageId};
use crate::process::{ProcessAction, ProcessRequest};
use crate::tags::TagStore;
use chrono::NaiveDate;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum Effect {
    RefreshDirectory,
    LoadEmails { seq: u64, company_id: String },
    LoadDetail { seq: u64, message: Message },
    Process(ProcessRequest),
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Directory(DirectoryLookup),
    Emails {
        seq: u64,
        result: Result<Vec<Message>, ApiError>,
    },
    Detail {
        seq: u64,
        result: Result<Message, ApiError>,
    },
    Processed {
        message_id: MessageId,
        result: Result<(), ApiError>,
    },
}

pub async fn execute(effect: Effect, backend: &dyn MailBackend) -> Outcome {
    match effect {
        Effect::RefreshDirectory => {
            let mut directory = DirectoryLookup::default();
            // a failed listing leaves the lookup empty with the error recorded
            let _ = directory.refresh(backend).await;
            Outcome::Directory(directory)
        }
        Effect::LoadEmails { seq, company_id } => Outcome::Emails {
            seq,
            result: backend.list_emails(&company_id).await,
        },
        Effect::LoadDetail { seq, message } => Outcome::Detail {
            seq,
            result: backend.fetch_detail(message).await,
        },
        Effect::Process(req) => Outcome::Processed {
            message_id: req.message_id,
            result: backend.process(&req.endpoint, &req.path).await,
        },
    }
}

/// What the detail pane shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DetailPane {
    #[default]
    Empty,
    Loading { seq: u64, id: MessageId },
    Ready(Message),
}

/// Snapshot of the combined cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub folder: String,
    pub company_id: Option<String>,
    pub company_base_url: Option<String>,
    pub selected_message_id: Option<MessageId>,
    pub search_text: String,
}

pub struct SelectionController {
    folders: Vec<Folder>,
    folder_index: usize,
    company: Option<Company>,
    search_text: String,
    detail: DetailPane,
    detail_seq: u64,
    keep_results_on_company_clear: bool,
    directory: DirectoryLookup,
    emails: EmailStore,
    tags: TagStore,
    process: ProcessAction,
}

impl SelectionController {
    pub fn new(config: &Config) -> Self {
        let folders = Folder::defaults();
        let folder_index = folders.iter().position(Folder::is_inbox).unwrap_or(0);
        Self {
            folders,
            folder_index,
            company: None,
            search_text: String::new(),
            detail: DetailPane::Empty,
            detail_seq: 0,
            keep_results_on_company_clear: config.behavior.keep_results_on_company_clear,
            directory: DirectoryLookup::default(),
            emails: EmailStore::default(),
            tags: TagStore::new(config.tags.predefined.iter().cloned()),
            process: ProcessAction::new(
                config.behavior.process_date_encoding,
                config.api.process_endpoint.clone(),
            ),
        }
    }

    /// Effects to run once when the view comes up.
    pub fn start(&mut self) -> Vec<Effect> {
        vec![Effect::RefreshDirectory]
    }

    pub fn select_folder(&mut self, index: usize) -> Vec<Effect> {
        if index >= self.folders.len() || index == self.folder_index {
            return Vec::new();
        }
        self.folder_index = index;
        debug!(folder = %self.folders[index].id, "Folder changed");
        self.reload()
    }

    /// Choosing a company always switches to the Inbox.
    pub fn select_company(&mut self, company: Company) -> Vec<Effect> {
        debug!(company = %company.id, "Company selected");
        self.company = Some(company);
        if let Some(inbox) = self.folders.iter().position(Folder::is_inbox) {
            self.folder_index = inbox;
        }
        self.reload()
    }

    pub fn clear_company(&mut self) -> Vec<Effect> {
        if self.company.take().is_none() {
            return Vec::new();
        }
        debug!(
            keep = self.keep_results_on_company_clear,
            "Company cleared"
        );
        if !self.keep_results_on_company_clear {
            self.emails.invalidate();
            self.detail = DetailPane::Empty;
        }
        Vec::new()
    }

    /// Selects a message and fetches its detail.
    pub fn open_message(&mut self, id: MessageId) -> Vec<Effect> {
        if !self.emails.select(id) {
            return Vec::new();
        }
        let Some(message) = self.emails.get(id).cloned() else {
            return Vec::new();
        };
        self.detail_seq += 1;
        self.detail = DetailPane::Loading {
            seq: self.detail_seq,
            id,
        };
        self.process.reset();
        vec![Effect::LoadDetail {
            seq: self.detail_seq,
            message,
        }]
    }

    pub fn set_search_text(&mut self, text: &str) {
        self.search_text = text.to_string();
    }

    /// Snapshots the shown message and company URL and starts a process call.
    pub fn process_selected(&mut self, today: NaiveDate) -> Vec<Effect> {
        let Some(message) = self.shown_message().cloned() else {
            return Vec::new();
        };
        let selection = self.selection();
        self.process
            .begin(&message, selection.company_base_url.as_deref(), today)
            .map(Effect::Process)
            .into_iter()
            .collect()
    }

    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Directory(directory) => self.directory = directory,
            Outcome::Emails { seq, result } => {
                if self.emails.finish_load(seq, result) {
                    self.detail = self
                        .emails
                        .selected()
                        .cloned()
                        .map_or(DetailPane::Empty, DetailPane::Ready);
                }
            }
            Outcome::Detail { seq, result } => {
                let DetailPane::Loading { seq: pending, id } = self.detail else {
                    return;
                };
                if pending != seq {
                    debug!(seq, pending, "Dropping stale detail response");
                    return;
                }
                self.detail = match result {
                    Ok(message) if message.id == id => DetailPane::Ready(message),
                    Ok(_) | Err(_) => {
                        warn!(id, "Detail fetch failed, showing list snapshot");
                        self.emails
                            .get(id)
                            .cloned()
                            .map_or(DetailPane::Empty, DetailPane::Ready)
                    }
                };
            }
            Outcome::Processed { message_id, result } => {
                self.process
                    .finish(message_id, self.emails.selected_id(), result)
            }
        }
    }

    fn reload(&mut self) -> Vec<Effect> {
        self.detail = DetailPane::Empty;
        self.process.reset();

        let folder = &self.folders[self.folder_index];
        let company_id = self.company.as_ref().map(|c| c.id.as_str());
        match (self.emails.request(folder, company_id), company_id) {
            (Some(seq), Some(company_id)) => vec![Effect::LoadEmails {
                seq,
                company_id: company_id.to_string(),
            }],
            _ => Vec::new(),
        }
    }

    /// The message rendered in the detail pane, `None` while its detail is loading.
    pub fn shown_message(&self) -> Option<&Message> {
        match &self.detail {
            DetailPane::Ready(message) => Some(message),
            _ => None,
        }
    }

    pub fn visible_messages(&self) -> Vec<&Message> {
        self.emails.filter(&self.search_text)
    }

    pub fn selection(&self) -> Selection {
        Selection {
            folder: self.folder().id.clone(),
            company_id: self.company.as_ref().map(|c| c.id.clone()),
            company_base_url: self.company.as_ref().map(|c| c.base_url.clone()),
            selected_message_id: self.emails.selected_id(),
            search_text: self.search_text.clone(),
        }
    }

    pub fn folder(&self) -> &Folder {
        &self.folders[self.folder_index]
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn folder_index(&self) -> usize {
        self.folder_index
    }

    pub fn company(&self) -> Option<&Company> {
        self.company.as_ref()
    }

    pub fn detail(&self) -> &DetailPane {
        &self.detail
    }

    pub fn directory(&self) -> &DirectoryLookup {
        &self.directory
    }

    pub fn emails(&self) -> &EmailStore {
        &self.emails
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagStore {
        &mut self.tags
    }

    pub fn process(&self) -> &ProcessAction {
        &self.process
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockBackend;
    use crate::api::testing::{ScriptedBackend, message};
    use crate::email_store::LoadState;
    use crate::process::ProcessState;

    async fn run(ctl: &mut SelectionController, backend: &dyn MailBackend, effects: Vec<Effect>) {
        for effect in effects {
            let outcome = execute(effect, backend).await;
            ctl.apply(outcome);
        }
    }

    fn company(id: &str, url: &str) -> Company {
        Company {
            id: id.to_string(),
            name: format!("Company {}", id),
            base_url: url.to_string(),
        }
    }

    fn controller() -> SelectionController {
        SelectionController::new(&Config::default())
    }

    fn sent_index(ctl: &SelectionController) -> usize {
        ctl.folders().iter().position(|f| f.id == "Sent").unwrap()
    }

    #[tokio::test]
    async fn test_start_populates_directory() {
        let mut ctl = controller();
        let effects = ctl.start();
        run(&mut ctl, &MockBackend::instant(), effects).await;
        assert_eq!(ctl.directory().search("acme").len(), 1);
    }

    #[tokio::test]
    async fn test_company_selection_forces_inbox_and_loads() {
        let mut ctl = controller();
        ctl.select_folder(sent_index(&ctl));

        let effects = ctl.select_company(company("1", "https://a.test"));
        assert!(ctl.folder().is_inbox());
        assert!(ctl.emails().is_loading());
        assert!(matches!(effects.as_slice(), [Effect::LoadEmails { .. }]));

        run(&mut ctl, &MockBackend::instant(), effects).await;
        assert_eq!(ctl.emails().messages().len(), 6);
        assert_eq!(ctl.selection().selected_message_id, Some(1));
        assert_eq!(ctl.shown_message().map(|m| m.id), Some(1));
    }

    #[tokio::test]
    async fn test_non_inbox_folder_always_empty() {
        let mut ctl = controller();
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &MockBackend::instant(), effects).await;
        assert!(!ctl.emails().messages().is_empty());

        for index in 1..ctl.folders().len() {
            let effects = ctl.select_folder(index);
            assert!(effects.is_empty());
            assert!(ctl.visible_messages().is_empty());
            assert_eq!(ctl.selection().selected_message_id, None);
            assert_eq!(ctl.detail(), &DetailPane::Empty);
        }
    }

    #[tokio::test]
    async fn test_back_to_inbox_reloads() {
        let mut ctl = controller();
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &MockBackend::instant(), effects).await;

        ctl.select_folder(sent_index(&ctl));
        let effects = ctl.select_folder(0);
        assert_eq!(effects.len(), 1);
        run(&mut ctl, &MockBackend::instant(), effects).await;
        assert_eq!(ctl.emails().messages().len(), 6);
    }

    #[test]
    fn test_inbox_without_company_has_no_fetch() {
        let mut ctl = controller();
        ctl.select_folder(sent_index(&ctl));
        let effects = ctl.select_folder(0);
        assert!(effects.is_empty());
        assert_eq!(ctl.emails().state(), LoadState::Loaded);
        assert!(ctl.visible_messages().is_empty());
    }

    #[tokio::test]
    async fn test_rapid_switching_keeps_latest_response() {
        let backend = ScriptedBackend::new(vec![
            Ok(vec![message(1, "first", "a", "a")]),
            Ok(vec![message(2, "second", "b", "b")]),
        ]);
        let mut ctl = controller();
        let first = ctl.select_company(company("1", "https://a.test"));
        let second = ctl.select_company(company("2", "https://b.test"));

        // responses resolve in issue order; the older one must not win
        run(&mut ctl, &backend, first).await;
        assert!(ctl.emails().is_loading());
        run(&mut ctl, &backend, second).await;

        assert_eq!(ctl.emails().messages().len(), 1);
        assert_eq!(ctl.emails().messages()[0].sender, "second");
    }

    #[tokio::test]
    async fn test_failed_load_then_success_for_same_company() {
        let backend = ScriptedBackend::new(vec![
            Err(ApiError::Network("simulated".into())),
            Ok(vec![message(1, "a", "b", "c"), message(2, "d", "e", "f")]),
        ]);
        let mut ctl = controller();

        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &backend, effects).await;
        assert!(ctl.visible_messages().is_empty());
        assert_eq!(ctl.selection().selected_message_id, None);
        assert_eq!(ctl.detail(), &DetailPane::Empty);

        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &backend, effects).await;
        assert_eq!(ctl.visible_messages().len(), 2);
        assert_eq!(ctl.selection().selected_message_id, Some(1));
    }

    #[tokio::test]
    async fn test_tags_survive_company_switch() {
        let backend = ScriptedBackend::new(vec![
            Ok(vec![message(1, "a", "from A", "x")]),
            Ok(vec![message(1, "b", "from B", "y")]),
        ]);
        let mut ctl = controller();

        let effects = ctl.select_company(company("A", "https://a.test"));
        run(&mut ctl, &backend, effects).await;
        ctl.tags_mut().add_tag(1, "Work");

        let effects = ctl.select_company(company("B", "https://b.test"));
        run(&mut ctl, &backend, effects).await;

        assert_eq!(ctl.emails().messages()[0].subject, "from B");
        assert_eq!(ctl.tags().tags_for(1), vec!["Work".to_string()]);
    }

    #[tokio::test]
    async fn test_open_message_shows_loading_detail() {
        let mut ctl = controller();
        let backend = MockBackend::instant();
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &backend, effects).await;

        let effects = ctl.open_message(3);
        assert!(matches!(ctl.detail(), DetailPane::Loading { id: 3, .. }));
        assert_eq!(ctl.shown_message(), None);
        assert_eq!(ctl.selection().selected_message_id, Some(3));

        run(&mut ctl, &backend, effects).await;
        assert_eq!(ctl.shown_message().map(|m| m.sender.as_str()), Some("Spark"));
    }

    #[tokio::test]
    async fn test_stale_detail_is_dropped() {
        let mut ctl = controller();
        let backend = MockBackend::instant();
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &backend, effects).await;

        let older = ctl.open_message(2);
        let newer = ctl.open_message(4);
        run(&mut ctl, &backend, older).await;
        assert!(matches!(ctl.detail(), DetailPane::Loading { id: 4, .. }));
        run(&mut ctl, &backend, newer).await;
        assert_eq!(ctl.shown_message().map(|m| m.id), Some(4));
    }

    #[test]
    fn test_open_unknown_message_is_noop() {
        let mut ctl = controller();
        assert!(ctl.open_message(5).is_empty());
        assert_eq!(ctl.detail(), &DetailPane::Empty);
    }

    #[tokio::test]
    async fn test_clear_company_clears_list_by_default() {
        let mut ctl = controller();
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &MockBackend::instant(), effects).await;

        assert!(ctl.clear_company().is_empty());
        assert_eq!(ctl.selection().company_id, None);
        assert!(ctl.folder().is_inbox());
        assert!(ctl.visible_messages().is_empty());
        assert_eq!(ctl.detail(), &DetailPane::Empty);
    }

    #[tokio::test]
    async fn test_clear_company_can_keep_results() {
        let mut config = Config::default();
        config.behavior.keep_results_on_company_clear = true;
        let mut ctl = SelectionController::new(&config);
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &MockBackend::instant(), effects).await;

        ctl.clear_company();
        assert_eq!(ctl.selection().company_base_url, None);
        assert_eq!(ctl.visible_messages().len(), 6);
    }

    #[tokio::test]
    async fn test_search_text_filters_visible_messages() {
        let mut ctl = controller();
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &MockBackend::instant(), effects).await;

        ctl.set_search_text("sanebox");
        assert_eq!(ctl.visible_messages().len(), 3);
        assert_eq!(ctl.selection().search_text, "sanebox");
        ctl.set_search_text("");
        assert_eq!(ctl.visible_messages().len(), 6);
    }

    #[tokio::test]
    async fn test_process_builds_documented_path() {
        let backend = ScriptedBackend::new(vec![Ok(vec![message(42, "a", "b", "c")])]);
        let mut ctl = controller();
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &backend, effects).await;

        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let effects = ctl.process_selected(today);
        assert!(ctl.process().is_in_flight());
        assert!(ctl.process_selected(today).is_empty());

        run(&mut ctl, &backend, effects).await;
        assert_eq!(ctl.process().state(), &ProcessState::Succeeded);
        let processed = backend.processed.lock().unwrap();
        assert_eq!(
            processed.as_slice(),
            [(
                "https://a.test/".to_string(),
                "https://a.test/outlook/email/060162466/42".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_process_without_company_reports_missing_url() {
        let mut config = Config::default();
        config.behavior.keep_results_on_company_clear = true;
        let mut ctl = SelectionController::new(&config);
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &MockBackend::instant(), effects).await;
        ctl.clear_company();

        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(ctl.process_selected(today).is_empty());
        assert_eq!(
            ctl.process().state(),
            &ProcessState::Failed(ApiError::MissingUrl.to_string())
        );
    }

    #[tokio::test]
    async fn test_directory_failure_is_recorded() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.companies = Err(ApiError::Network("connection refused".into()));
        let mut ctl = controller();
        let effects = ctl.start();
        run(&mut ctl, &backend, effects).await;

        assert!(ctl.directory().is_empty());
        assert!(matches!(
            ctl.directory().last_error(),
            Some(ApiError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_process_result_after_switching_message_is_dropped() {
        let mut backend = ScriptedBackend::new(vec![Ok(vec![
            message(1, "a", "b", "c"),
            message(2, "d", "e", "f"),
        ])]);
        backend.process_result = Err(ApiError::HttpStatus(500));
        let mut ctl = controller();
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &backend, effects).await;

        let pending = ctl.process_selected(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        let opened = ctl.open_message(2);
        run(&mut ctl, &backend, pending).await;
        assert_eq!(ctl.process().state(), &ProcessState::Idle);

        run(&mut ctl, &backend, opened).await;
        assert_eq!(ctl.shown_message().map(|m| m.id), Some(2));
        assert_eq!(ctl.process().state(), &ProcessState::Idle);
    }

    #[tokio::test]
    async fn test_process_error_banner() {
        let mut backend = ScriptedBackend::new(vec![Ok(vec![message(1, "a", "b", "c")])]);
        backend.process_result = Err(ApiError::HttpStatus(503));
        let mut ctl = controller();
        let effects = ctl.select_company(company("1", "https://a.test"));
        run(&mut ctl, &backend, effects).await;

        let effects = ctl.process_selected(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        run(&mut ctl, &backend, effects).await;
        assert_eq!(
            ctl.process().state(),
            &ProcessState::Failed("Server responded with status 503".to_string())
        );
    }
}
