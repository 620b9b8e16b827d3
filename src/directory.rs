use crate::api::MailBackend;
use crate::error::ApiError;
use crate::models::Company;
use tracing::{debug, warn};

/// Cached company listing with substring search.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLookup {
    companies: Vec<Company>,
    last_error: Option<ApiError>,
}

impl DirectoryLookup {
    /// Companies whose name contains `query`, ignoring case. An empty query returns everything.
    pub fn search(&self, query: &str) -> Vec<Company> {
        let needle = query.trim().to_lowercase();
        self.companies
            .iter()
            .filter(|c| needle.is_empty() || c.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Fetches the listing from `backend` and applies it with [`Self::replace`].
    pub async fn refresh(&mut self, backend: &dyn MailBackend) -> Result<(), ApiError> {
        let result = backend.list_companies().await;
        self.replace(result)
    }

    /// Applies a completed listing. A failure leaves the cache empty.
    pub fn replace(&mut self, result: Result<Vec<Company>, ApiError>) -> Result<(), ApiError> {
        match result {
            Ok(companies) => {
                debug!(count = companies.len(), "Directory refreshed");
                self.companies = companies;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                warn!("Directory refresh failed: {}", e);
                self.companies.clear();
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockBackend;
    use crate::api::testing::ScriptedBackend;

    #[tokio::test]
    async fn test_search_is_case_insensitive_substring() {
        let mut dir = DirectoryLookup::default();
        dir.refresh(&MockBackend::instant()).await.unwrap();

        let hits = dir.search("GLOB");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Globex");
        assert_eq!(dir.search("").len(), 3);
        assert!(dir.search("zzz").is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_cache() {
        let mut dir = DirectoryLookup::default();
        dir.refresh(&MockBackend::instant()).await.unwrap();
        assert!(!dir.is_empty());

        let mut failing = ScriptedBackend::new(vec![]);
        failing.companies = Err(ApiError::Network("connection refused".into()));
        let result = dir.refresh(&failing).await;

        assert!(matches!(result, Err(ApiError::Network(_))));
        assert!(dir.is_empty());
        assert!(dir.search("").is_empty());
        assert!(dir.last_error().is_some());
    }

    #[test]
    fn test_suggestions_are_subset_of_listing() {
        let mut dir = DirectoryLookup::default();
        let listing = vec![
            Company {
                id: "1".into(),
                name: "Acme".into(),
                base_url: "https://a.test".into(),
            },
            Company {
                id: "2".into(),
                name: "Acme East".into(),
                base_url: "https://b.test".into(),
            },
        ];
        dir.replace(Ok(listing.clone())).unwrap();
        for hit in dir.search("acme") {
            assert!(listing.contains(&hit));
        }
        assert_eq!(dir.search("EAST"), vec![listing[1].clone()]);
    }
}
