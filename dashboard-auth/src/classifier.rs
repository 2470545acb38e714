use crate::config::ApiSettings;

/// Endpoints that must never go through authentication or refresh handling.
///
/// The refresh call itself is one of them; sending it through the pipeline
/// would recurse.
#[derive(Debug, Clone)]
pub struct PublicEndpoints {
    patterns: Vec<String>,
}

impl PublicEndpoints {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Login and refresh endpoints from the API settings.
    pub fn from_settings(api: &ApiSettings) -> Self {
        Self::new([api.login_path.as_str(), api.refresh_path.as_str()])
    }

    pub fn is_public(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| url.contains(p.as_str()))
    }
}
