//! webstack.yml record types
//!
//! The data file groups links as taxonomy -> term (category) -> links. These
//! types are the typed view the tools work with; the file itself stays an
//! order-preserving YAML document (see [`crate::store`]).

use serde::{Deserialize, Serialize};

/// Position of a link inside the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryLocator {
    pub taxonomy: usize,
    /// `None` when the taxonomy holds `links` directly instead of a `list` of terms
    pub term: Option<usize>,
    pub link: usize,
}

/// A single navigation link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEntry {
    /// Taxonomy name (first grouping level)
    pub taxonomy: String,
    /// Term name (second grouping level); empty when the taxonomy has no terms
    pub category: String,
    pub title: String,
    /// Never empty: links without a URL are not loaded
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub locator: Option<EntryLocator>,
}

impl NavigationEntry {
    /// Identity within the data file
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.taxonomy, &self.category, &self.title)
    }

    /// "Taxonomy > Term" label used in reports
    pub fn group_label(&self) -> String {
        if self.category.is_empty() {
            self.taxonomy.clone()
        } else {
            format!("{} > {}", self.taxonomy, self.category)
        }
    }

    pub fn has_logo(&self) -> bool {
        self.logo.as_deref().is_some_and(|l| !l.trim().is_empty())
    }

    pub fn has_description(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }
}

/// Per-entry result category written to reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Final answer 2xx; any redirects stay on the report line
    Ok,
    /// 3xx that could not be followed further
    Redirect,
    /// 4xx
    ClientError,
    /// 5xx
    ServerError,
    /// DNS, connection, TLS, timeout or redirect failures
    Unreachable,
    /// Quick mode: the server answered
    Reachable,
    /// Logo URL serves an image
    Valid,
    /// Logo URL is broken or serves an error page
    Invalid,
    HasLogo,
    MissingLogo,
    /// Field written by an update command
    Updated,
    /// Nothing usable found; entry left untouched
    Unresolved,
}

impl Outcome {
    /// Outcomes that count as failures in summaries and `--failed-only`
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Outcome::ClientError
                | Outcome::ServerError
                | Outcome::Unreachable
                | Outcome::Invalid
                | Outcome::MissingLogo
                | Outcome::Unresolved
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Outcome::Ok | Outcome::Reachable | Outcome::Valid | Outcome::HasLogo => "✅",
            Outcome::Updated => "📝",
            Outcome::Redirect => "🔄",
            Outcome::ClientError | Outcome::ServerError | Outcome::Invalid => "❌",
            Outcome::Unreachable => "🔌",
            Outcome::MissingLogo | Outcome::Unresolved => "⚠️",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Ok => "ok",
            Outcome::Redirect => "redirect",
            Outcome::ClientError => "client_error",
            Outcome::ServerError => "server_error",
            Outcome::Unreachable => "unreachable",
            Outcome::Reachable => "reachable",
            Outcome::Valid => "valid",
            Outcome::Invalid => "invalid",
            Outcome::HasLogo => "has_logo",
            Outcome::MissingLogo => "missing_logo",
            Outcome::Updated => "updated",
            Outcome::Unresolved => "unresolved",
        };
        f.write_str(s)
    }
}
