//! webstack-tools: maintenance tools for a webstack navigation data file
//!
//! Commands:
//! - check-links: probe every entry URL and write a report
//! - logo: find, check and maintain entry logos
//! - describe: fill in entry descriptions from the sites themselves

pub mod audit;
pub mod check_links;
pub mod cli;
pub mod config;
pub mod describe;
pub mod error;
pub mod extract;
pub mod favicon;
pub mod logo;
pub mod pool;
pub mod probe;
pub mod providers;
pub mod report;
pub mod retry;
pub mod schema;
pub mod scorer;
pub mod store;

pub use audit::{audit, classify, AuditOptions};
pub use config::Settings;
pub use error::{ReportError, StoreError};
pub use extract::DescriptionExtractor;
pub use favicon::{LogoCheck, LogoFinder};
pub use probe::{FailureReason, ProbeResult, Prober};
pub use report::{Report, ReportEntry, ReportFormat};
pub use schema::{NavigationEntry, Outcome};
pub use scorer::{LogoCandidate, LogoScorer};
pub use store::Webstack;
