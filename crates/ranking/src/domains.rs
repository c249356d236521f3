//! Research domains and their leaderboard tables

use regex_lite::Regex;
use scholarsearch_common::{AppError, Result};

/// Pseudo-domain of the cross-domain leaderboard
pub const ALL_DOMAINS: &str = "all";

pub const DOMAINS: [&str; 26] = [
    "Medicine",
    "Social Sciences",
    "Engineering",
    "Arts and Humanities",
    "Physics and Astronomy",
    "Computer Science",
    "Agricultural and Biological Sciences",
    "Biochemistry, Genetics and Molecular Biology",
    "Environmental Science",
    "Economics, Econometrics and Finance",
    "Materials Science",
    "Business, Management and Accounting",
    "Psychology",
    "Earth and Planetary Sciences",
    "Health Professions",
    "Chemistry",
    "Mathematics",
    "Neuroscience",
    "Decision Sciences",
    "Immunology and Microbiology",
    "Energy",
    "Nursing",
    "Pharmacology, Toxicology and Pharmaceutics",
    "Dentistry",
    "Chemical Engineering",
    "Veterinary",
];

/// Maps a domain name to its table, e.g. "Computer Science" to
/// `scholar_ranking_computer_science`
#[derive(Debug, Clone)]
pub struct TableNamer {
    prefix: String,
    separators: Regex,
}

impl TableNamer {
    pub fn new(prefix: &str) -> Result<Self> {
        let separators = Regex::new(r"[^a-z0-9]+").map_err(|e| AppError::Internal {
            message: format!("table name pattern: {}", e),
        })?;
        Ok(Self {
            prefix: prefix.to_string(),
            separators,
        })
    }

    pub fn table(&self, domain: &str) -> Result<String> {
        let lowered = domain.trim().to_lowercase();
        let slug = self.separators.replace_all(&lowered, "_");
        let slug = slug.trim_matches('_');
        if slug.is_empty() {
            return Err(AppError::Validation {
                message: format!("'{}' is not a usable domain name", domain),
                field: Some("domain".to_string()),
            });
        }
        Ok(format!("{}{}", self.prefix, slug))
    }
}
