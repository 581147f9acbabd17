use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Optional subject/sender/snippet text that arrived alongside a link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub snippet: Option<String>,
}

impl MessageContext {
    // Subject and snippet joined by a space; the text location and
    // employment type are read from.
    pub fn combined_text(&self) -> String {
        format!(
            "{} {}",
            self.subject.as_deref().unwrap_or(""),
            self.snippet.as_deref().unwrap_or("")
        )
    }

    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.sender.is_none() && self.snippet.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    pub url: String,
    pub context: Option<MessageContext>,
}

impl CandidateLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            context: None,
        }
    }

    pub fn with_context(url: impl Into<String>, context: MessageContext) -> Self {
        Self {
            url: url.into(),
            context: Some(context),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(format!("unknown confidence '{}' (expected low, medium, high)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    Gmail,
    Manual,
    Linkedin,
    Indeed,
    Glassdoor,
    Other,
}

impl JobSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobSource::Gmail => "gmail",
            JobSource::Manual => "manual",
            JobSource::Linkedin => "linkedin",
            JobSource::Indeed => "indeed",
            JobSource::Glassdoor => "glassdoor",
            JobSource::Other => "other",
        }
    }

    // Board platforms strong enough to override a caller-declared source.
    pub fn from_board_domain(domain: &str) -> Option<Self> {
        let name = domain.split(['.', '/']).next().unwrap_or("");
        match name {
            "linkedin" => Some(JobSource::Linkedin),
            "indeed" => Some(JobSource::Indeed),
            "glassdoor" => Some(JobSource::Glassdoor),
            _ => None,
        }
    }

    pub fn is_known_platform(&self) -> bool {
        matches!(self, JobSource::Linkedin | JobSource::Indeed | JobSource::Glassdoor)
    }
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gmail" => Ok(JobSource::Gmail),
            "manual" => Ok(JobSource::Manual),
            "linkedin" => Ok(JobSource::Linkedin),
            "indeed" => Ok(JobSource::Indeed),
            "glassdoor" => Ok(JobSource::Glassdoor),
            "other" => Ok(JobSource::Other),
            other => Err(format!(
                "unknown source '{}' (expected gmail, manual, linkedin, indeed, glassdoor, other)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatednessVerdict {
    pub url: String,
    pub is_job_link: bool,
    pub confidence: Confidence,
    pub score: u32,
    pub matched_source: Option<String>,
    pub reasons: Vec<String>,
}

pub const DEFAULT_TITLE: &str = "Job Opportunity";
pub const DEFAULT_COMPANY: &str = "Unknown Company";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub job_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub source: JobSource,
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub url: String,
    pub normalized_url: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub source: JobSource,
    pub tags: Vec<String>,
    // How likely the link is a job posting (classifier tier).
    pub relatedness: Confidence,
    // How much metadata could be recovered (categorizer tier).
    pub richness: Confidence,
    pub reasons: Vec<String>,
    pub context: Option<MessageContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub accepted: Vec<EnrichedRecord>,
    pub filtered_count: usize,
    pub duplicate_count: usize,
}

// Labels the employment-type detector can produce, in precedence order.
pub const EMPLOYMENT_TYPES: [&str; 9] = [
    "Full-time",
    "Part-time",
    "Contract",
    "Freelance",
    "Internship",
    "Temporary",
    "Remote",
    "Hybrid",
    "On-site",
];

pub const LINK_STATUSES: [&str; 5] = ["saved", "applied", "interview", "rejected", "offer"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedLink {
    pub id: i64,
    pub owner: String,
    pub url: String,
    pub normalized_url: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub source: String,
    pub status: String, // "saved", "applied", "interview", "rejected", "offer"
    pub relatedness: String,
    pub richness: String,
    pub tags: Vec<String>,
    pub email_subject: Option<String>,
    pub email_sender: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

// Manual overrides for a saved link. `None` leaves a field untouched;
// `Some("")` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct LinkUpdate {
    pub status: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl LinkUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.title.is_none()
            && self.company.is_none()
            && self.location.is_none()
            && self.job_type.is_none()
            && self.tags.is_none()
            && self.notes.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert_eq!("HIGH".parse::<Confidence>(), Ok(Confidence::High));
        assert!("certain".parse::<Confidence>().is_err());
    }

    #[test]
    fn test_job_source_from_board_domain() {
        assert_eq!(JobSource::from_board_domain("linkedin.com"), Some(JobSource::Linkedin));
        assert_eq!(JobSource::from_board_domain("indeed.com"), Some(JobSource::Indeed));
        assert_eq!(JobSource::from_board_domain("glassdoor.com"), Some(JobSource::Glassdoor));
        assert_eq!(JobSource::from_board_domain("lever.co"), None);
        assert_eq!(JobSource::from_board_domain("stackoverflow.com/jobs"), None);
    }

    #[test]
    fn test_job_source_serializes_lowercase() {
        let json = serde_json::to_string(&JobSource::Glassdoor).unwrap();
        assert_eq!(json, "\"glassdoor\"");
        assert_eq!("Manual".parse::<JobSource>(), Ok(JobSource::Manual));
    }

    #[test]
    fn test_message_context_combined_text() {
        let ctx = MessageContext {
            subject: Some("Backend role".to_string()),
            sender: Some("jobs@acme.io".to_string()),
            snippet: None,
        };
        assert_eq!(ctx.combined_text(), "Backend role ");
        assert!(!ctx.is_empty());
        assert!(MessageContext::default().is_empty());
    }
}
