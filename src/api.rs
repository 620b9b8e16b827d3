use crate::config::ApiSettings;
use crate::error::ApiError;
use crate::models::{self, Company, Message};
use anyhow::{Context, Result};
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, StatusCode};
use hyper_rustls::HttpsConnector;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Where companies and emails come from.
#[async_trait]
pub trait MailBackend: Send + Sync {
    async fn list_companies(&self) -> Result<Vec<Company>, ApiError>;

    async fn list_emails(&self, company_id: &str) -> Result<Vec<Message>, ApiError>;

    /// Per-message detail fetch. The list endpoint already carries everything we
    /// render, so backends may hand the snapshot straight back.
    async fn fetch_detail(&self, message: Message) -> Result<Message, ApiError>;

    /// POST `{ "url": path }` to the processing endpoint.
    async fn process(&self, endpoint: &str, path: &str) -> Result<(), ApiError>;
}

pub fn from_settings(settings: &ApiSettings, api_key: String) -> Result<Arc<dyn MailBackend>> {
    match settings.data_source {
        crate::config::DataSource::Mock => Ok(Arc::new(MockBackend::new(
            Duration::from_millis(settings.list_delay_ms),
            Duration::from_millis(settings.detail_delay_ms),
        ))),
        crate::config::DataSource::Remote => {
            let backend = RemoteBackend::new(&settings.directory_host, api_key)
                .context("Failed to build HTTP client")?;
            Ok(Arc::new(backend))
        }
    }
}

#[derive(Serialize)]
struct ProcessBody<'a> {
    url: &'a str,
}

#[derive(Clone)]
pub struct RemoteBackend {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    directory_host: String,
    api_key: String,
}

impl RemoteBackend {
    pub fn new(directory_host: &str, api_key: String) -> Result<Self> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native roots")?
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self {
            client: Client::builder().build(connector),
            directory_host: directory_host.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_json(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        debug!(url, "GET");
        let req = Request::builder()
            .method(Method::GET)
            .uri(url)
            .header("x-api-key", &self.api_key)
            .header("accept", "application/json")
            .body(Body::empty())
            .map_err(|e| ApiError::Network(format!("invalid request to {}: {}", url, e)))?;

        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> Result<Vec<u8>, ApiError> {
        let resp = self.client.request(req).await?;
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await?;
        check_status(status)?;
        Ok(bytes.to_vec())
    }
}

/// Company ids are opaque, so they go into the path percent-encoded.
fn emails_url(directory_host: &str, company_id: &str) -> String {
    format!(
        "{}/get_all_emails/{}",
        directory_host,
        urlencoding::encode(company_id)
    )
}

fn check_status(status: StatusCode) -> Result<(), ApiError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ApiError::HttpStatus(status.as_u16()))
    }
}

#[async_trait]
impl MailBackend for RemoteBackend {
    async fn list_companies(&self) -> Result<Vec<Company>, ApiError> {
        let url = format!("{}/get_all_companies", self.directory_host);
        let body = self.get_json(&url).await?;
        models::parse_companies(&body)
    }

    async fn list_emails(&self, company_id: &str) -> Result<Vec<Message>, ApiError> {
        let url = emails_url(&self.directory_host, company_id);
        let body = self.get_json(&url).await?;
        models::parse_emails(&body)
    }

    async fn fetch_detail(&self, message: Message) -> Result<Message, ApiError> {
        Ok(message)
    }

    async fn process(&self, endpoint: &str, path: &str) -> Result<(), ApiError> {
        debug!(endpoint, path, "POST process");
        let payload = serde_json::to_vec(&ProcessBody { url: path })?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(endpoint)
            .header("content-type", "application/json")
            .body(Body::from(payload))
            .map_err(|e| ApiError::Network(format!("invalid request to {}: {}", endpoint, e)))?;

        self.send(req).await.map(|_| ())
    }
}

/// In-memory data with simulated latency, for running without the remote services.
#[derive(Debug, Clone)]
pub struct MockBackend {
    list_delay: Duration,
    detail_delay: Duration,
    companies: Vec<Company>,
    emails: Vec<Message>,
}

impl MockBackend {
    pub fn new(list_delay: Duration, detail_delay: Duration) -> Self {
        Self {
            list_delay,
            detail_delay,
            companies: mock_companies(),
            emails: mock_emails(),
        }
    }

    #[cfg(test)]
    pub fn instant() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl MailBackend for MockBackend {
    async fn list_companies(&self) -> Result<Vec<Company>, ApiError> {
        Self::pause(self.list_delay).await;
        Ok(self.companies.clone())
    }

    async fn list_emails(&self, company_id: &str) -> Result<Vec<Message>, ApiError> {
        Self::pause(self.list_delay).await;
        if !self.companies.iter().any(|c| c.id == company_id) {
            return Ok(Vec::new());
        }
        Ok(self.emails.clone())
    }

    async fn fetch_detail(&self, message: Message) -> Result<Message, ApiError> {
        Self::pause(self.detail_delay).await;
        Ok(self
            .emails
            .iter()
            .find(|m| m.id == message.id)
            .cloned()
            .unwrap_or(message))
    }

    async fn process(&self, endpoint: &str, path: &str) -> Result<(), ApiError> {
        Self::pause(self.detail_delay).await;
        debug!(endpoint, path, "mock process accepted");
        Ok(())
    }
}

fn mock_companies() -> Vec<Company> {
    [
        ("1", "Acme Corporation", "https://acme.example.com"),
        ("2", "Globex", "https://globex.example.com"),
        ("3", "Initech", "https://initech.example.com"),
    ]
    .into_iter()
    .map(|(id, name, url)| Company {
        id: id.to_string(),
        name: name.to_string(),
        base_url: url.to_string(),
    })
    .collect()
}

fn mock_emails() -> Vec<Message> {
    let entry = |id: i64,
                 sender: &str,
                 subject: &str,
                 preview: &str,
                 time: &str,
                 is_unread: bool,
                 category: Option<&str>| Message {
        id,
        sender: sender.to_string(),
        subject: subject.to_string(),
        body_preview: preview.to_string(),
        timestamp_label: time.to_string(),
        is_unread,
        category: category.map(str::to_string),
        recipient: Some("mike@example.com".to_string()),
    };

    vec![
        entry(
            1,
            "Lisa Greenberg",
            "Book Recommendations",
            "I'm a huge productivity nerd and was...",
            "8:19 AM",
            true,
            Some("Personal"),
        ),
        entry(
            2,
            "John Smith",
            "Welcome Back",
            "Hey Mike, Good to see you are back",
            "8:16 AM",
            true,
            None,
        ),
        entry(
            3,
            "Spark",
            "New email account login in Spark",
            "Your email address -",
            "8:07 AM",
            true,
            None,
        ),
        entry(
            4,
            "SaneBox",
            "What's new with your SaneBox acco...",
            "Goto my Dashboard Hi Mike! Share",
            "Nov 16",
            false,
            None,
        ),
        entry(
            5,
            "SaneBox",
            "What's new with your SaneBox acco...",
            "Goto my Dashboard Hi Mike! Share",
            "Nov 9",
            false,
            None,
        ),
        entry(
            6,
            "SaneBox Digest",
            "(Sane Digest) 11 recent messages f...",
            "Email address:",
            "Yesterday",
            false,
            Some("Newsletters"),
        ),
    ]
}
