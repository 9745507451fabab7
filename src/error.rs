use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParentScanError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error), // Converts io::Error into ParentScanError automatically

    #[error("{} for {url}", status_label(.status))]
    Fetch { status: Option<u16>, url: String },

    #[error("Request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid JSON in {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{count} error(s) found")]
    Schema { count: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logger error: {0}")]
    Logger(#[from] flexi_logger::FlexiLoggerError),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}

impl ParentScanError {
    pub fn parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        ParentScanError::Parse {
            context: context.into(),
            source,
        }
    }

    /// True for errors raised while talking to the remote index.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            ParentScanError::Fetch { .. } | ParentScanError::Request { .. }
        )
    }
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "No response".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display_matches_status_for_url() {
        let err = ParentScanError::Fetch {
            status: Some(404),
            url: "http://index/inscription/abc".to_string(),
        };
        assert_eq!(err.to_string(), "404 for http://index/inscription/abc");
        assert!(err.is_fetch_error());
    }

    #[test]
    fn test_parse_error_names_context() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ParentScanError::parse("collections/abc.json", source);
        assert!(err.to_string().starts_with("Invalid JSON in collections/abc.json"));
        assert!(!err.is_fetch_error());
    }
}
