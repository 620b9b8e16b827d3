use crate::error::ApiError;
use inflections::case::to_title_case;
use serde::{Deserialize, Serialize};

pub type MessageId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: String,
    pub subject: String,
    pub body_preview: String,
    pub timestamp_label: String,
    pub is_unread: bool,
    pub category: Option<String>,
    pub recipient: Option<String>,
}

impl Message {
    /// Two-letter initials used for the sender avatar
    pub fn sender_initials(&self) -> String {
        self.sender
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    /// Backed by the email-list endpoint, carries an unread badge
    Inbox,
    /// Navigable but never loads data
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub icon: &'static str,
    pub kind: FolderKind,
    pub display_name: String,
}

impl Folder {
    pub const INBOX: &'static str = "INBOX";

    pub fn new(id: &str, icon: &'static str) -> Self {
        let kind = if id.eq_ignore_ascii_case(Self::INBOX) {
            FolderKind::Inbox
        } else {
            FolderKind::Local
        };
        Self {
            id: id.to_string(),
            icon,
            kind,
            display_name: to_title_case(id),
        }
    }

    pub fn is_inbox(&self) -> bool {
        self.kind == FolderKind::Inbox
    }

    pub fn defaults() -> Vec<Folder> {
        vec![
            Folder::new("INBOX", "📧"),
            Folder::new("CALENDAR", "📅"),
            Folder::new("Sent", "📤"),
            Folder::new("Drafts", "📝"),
            Folder::new("Pins", "📌"),
            Folder::new("Archive", "📦"),
            Folder::new("More", "⋯"),
        ]
    }
}

/// Identifier fields arrive as either JSON strings or numbers depending on the endpoint revision.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s,
            WireId::Number(n) => n.to_string(),
        }
    }

    fn into_message_id(self) -> Result<MessageId, ApiError> {
        match self {
            WireId::Number(n) => Ok(n),
            WireId::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| ApiError::Parse(format!("message id {:?} is not an integer", s))),
        }
    }
}

/// One entry of `get_all_companies`
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyRecord {
    pub company_id: WireId,
    #[serde(alias = "name")]
    pub company_name: String,
    pub url: String,
}

impl From<CompanyRecord> for Company {
    fn from(r: CompanyRecord) -> Self {
        Company {
            id: r.company_id.into_string(),
            name: r.company_name,
            base_url: r.url.trim_end_matches('/').to_string(),
        }
    }
}

/// One entry of `get_all_emails/{company_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct EmailRecord {
    pub id: WireId,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, alias = "body")]
    pub preview: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub is_unread: bool,
    #[serde(default)]
    pub category: Option<String>,
}

impl TryFrom<EmailRecord> for Message {
    type Error = ApiError;

    fn try_from(r: EmailRecord) -> Result<Self, Self::Error> {
        Ok(Message {
            id: r.id.into_message_id()?,
            sender: r.sender,
            subject: r.subject,
            body_preview: r.preview,
            timestamp_label: r.date,
            is_unread: r.is_unread,
            category: r.category.filter(|c| !c.trim().is_empty()),
            recipient: r.recipient,
        })
    }
}

pub fn parse_companies(body: &[u8]) -> Result<Vec<Company>, ApiError> {
    let records: Vec<CompanyRecord> = serde_json::from_slice(body)?;
    Ok(records.into_iter().map(Company::from).collect())
}

pub fn parse_emails(body: &[u8]) -> Result<Vec<Message>, ApiError> {
    let records: Vec<EmailRecord> = serde_json::from_slice(body)?;
    records.into_iter().map(Message::try_from).collect()
}
