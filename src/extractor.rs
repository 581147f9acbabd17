use url::{Host, Url};

use crate::models::{ExtractedMetadata, MessageContext, DEFAULT_COMPANY, DEFAULT_TITLE};
use crate::normalize::strip_www;
use crate::signals::{detect_employment_type, detect_location};
use crate::tables::{host_matches, Tables};

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn slug_words(slug: &str) -> impl Iterator<Item = &str> {
    slug.split(['-', '_', ' '])
}

/// "acme-robotics" -> "Acme Robotics"
pub fn format_company(slug: &str) -> String {
    let formatted = slug_words(slug).map(capitalize).collect::<Vec<_>>().join(" ");
    if formatted.trim().is_empty() {
        DEFAULT_COMPANY.to_string()
    } else {
        formatted
    }
}

// Strips a leading numeric id such as "998-" or "42_".
fn strip_id_prefix(segment: &str) -> &str {
    let digits = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    if digits == 0 {
        return segment;
    }
    let rest = &segment[digits..];
    rest.strip_prefix(['-', '_']).unwrap_or(rest)
}

pub struct Extractor<'t> {
    tables: &'t Tables,
}

impl<'t> Extractor<'t> {
    pub fn new(tables: &'t Tables) -> Self {
        Self { tables }
    }

    /// "vp-of-sales" -> "Vp of Sales"; minor words stay lower-case unless first.
    pub fn format_title(&self, slug: &str) -> String {
        let formatted = slug_words(slug)
            .map(|word| {
                let lower = word.to_lowercase();
                if self.tables.minor_words.contains(&lower) {
                    lower
                } else {
                    capitalize(word)
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        if formatted.trim().is_empty() {
            return DEFAULT_TITLE.to_string();
        }
        let mut chars = formatted.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => DEFAULT_TITLE.to_string(),
        }
    }

    // Title from the last meaningful path segment.
    pub fn title_from_url(&self, url: &str) -> String {
        let Ok(parsed) = Url::parse(url) else {
            return DEFAULT_TITLE.to_string();
        };

        let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();
        for segment in segments.iter().rev() {
            if segment.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let lower = segment.to_lowercase();
            if self.tables.title_stopwords.contains(&lower) {
                continue;
            }
            let cleaned = strip_id_prefix(segment);
            if !cleaned.is_empty() {
                return self.format_title(cleaned);
            }
        }

        DEFAULT_TITLE.to_string()
    }

    fn is_reserved_host(&self, host: &str) -> bool {
        if self.tables.reserved_hosts.iter().any(|h| host_matches(host, h)) {
            return true;
        }
        let tld = host.rsplit('.').next().unwrap_or("");
        self.tables.reserved_tlds.iter().any(|t| t == tld)
    }

    // Company from the host, or from the path on ATS boards.
    pub fn company_from_url(&self, url: &str) -> String {
        let Ok(parsed) = Url::parse(url) else {
            return DEFAULT_COMPANY.to_string();
        };
        let host = match parsed.host() {
            Some(Host::Domain(domain)) => domain.to_lowercase(),
            // IP literals and host-less URLs name nobody
            _ => return DEFAULT_COMPANY.to_string(),
        };
        let host = strip_www(&host);

        if self.is_reserved_host(host) {
            return DEFAULT_COMPANY.to_string();
        }

        if let Some((_, company)) = self
            .tables
            .companies
            .iter()
            .find(|(domain, _)| host_matches(host, domain))
        {
            return company.clone();
        }

        // jobs.lever.co/<company>/..., boards.greenhouse.io/<company>/...
        // A bare board host gets the board's own name
        if let Some((_, board)) = self
            .tables
            .path_company_hosts
            .iter()
            .find(|(domain, _)| host_matches(host, domain))
        {
            return match parsed.path().split('/').find(|s| !s.is_empty()) {
                Some(slug) => format_company(slug),
                None => board.clone(),
            };
        }

        if let Some((_, label)) = self
            .tables
            .fixed_company_labels
            .iter()
            .find(|(domain, _)| host_matches(host, domain))
        {
            return label.clone();
        }

        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        if labels.len() >= 3 && self.tables.career_subdomains.iter().any(|s| s == labels[0]) {
            return format_company(labels[1]);
        }
        if labels.len() >= 2 {
            return format_company(labels[0]);
        }

        DEFAULT_COMPANY.to_string()
    }

    fn is_generic_word(&self, candidate: &str) -> bool {
        self.tables
            .subject_company_stopwords
            .iter()
            .any(|w| w.eq_ignore_ascii_case(candidate))
    }

    /// "Interview invitation from Acme Robotics" -> "Acme Robotics"
    pub fn company_from_subject(&self, subject: &str) -> Option<String> {
        self.tables
            .subject_company_patterns
            .iter()
            .filter_map(|re| re.captures(subject))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .find(|company| !company.is_empty() && !self.is_generic_word(company))
    }

    /// "Application for the Data Analyst role" -> "Data Analyst"
    pub fn title_from_subject(&self, subject: &str) -> Option<String> {
        self.tables
            .subject_title_patterns
            .iter()
            .filter_map(|re| re.captures(subject))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .find(|title| !title.is_empty() && !self.is_generic_word(title))
    }

    /// Title, company, location and employment type for a link.
    ///
    /// URL structure gives title and company; a message subject can replace
    /// the title, and fills in the company only when the URL gave nothing.
    /// Location and employment type come from message text alone.
    pub fn extract(&self, url: &str, context: Option<&MessageContext>) -> ExtractedMetadata {
        let mut title = self.title_from_url(url);
        let mut company = self.company_from_url(url);
        let mut location = None;
        let mut job_type = None;

        if let Some(ctx) = context {
            if let Some(subject) = ctx.subject.as_deref() {
                if let Some(subject_title) = self.title_from_subject(subject) {
                    if subject_title != DEFAULT_TITLE {
                        title = subject_title;
                    }
                }
                if let Some(subject_company) = self.company_from_subject(subject) {
                    if company == DEFAULT_COMPANY {
                        company = subject_company;
                    }
                }
            }

            let combined = ctx.combined_text();
            location = detect_location(self.tables, &combined);
            job_type = detect_employment_type(self.tables, &combined);
        }

        ExtractedMetadata {
            title,
            company,
            location,
            job_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(s: &str) -> MessageContext {
        MessageContext {
            subject: Some(s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_greenhouse_company_and_title() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        let meta = extractor.extract(
            "https://boards.greenhouse.io/acme-robotics/jobs/998-senior-backend-engineer",
            None,
        );
        assert_eq!(meta.company, "Acme Robotics");
        assert_eq!(meta.title, "Senior Backend Engineer");
        assert_eq!(meta.location, None);
        assert_eq!(meta.job_type, None);
    }

    #[test]
    fn test_fallback_defaults() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        assert_eq!(extractor.title_from_url("https://example.com/"), "Job Opportunity");
        assert_eq!(extractor.company_from_url("https://example.com/"), "Unknown Company");
        assert_eq!(extractor.title_from_url("garbage"), "Job Opportunity");
        assert_eq!(extractor.company_from_url("garbage"), "Unknown Company");
    }

    #[test]
    fn test_title_skips_ids_and_stopwords() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        assert_eq!(
            extractor.title_from_url("https://www.linkedin.com/jobs/view/12345"),
            "Job Opportunity"
        );
        assert_eq!(
            extractor.title_from_url("https://acme.io/careers/staff-data-engineer/apply"),
            "Staff Data Engineer"
        );
        assert_eq!(
            extractor.title_from_url("https://acme.io/positions/42_product_designer/"),
            "Product Designer"
        );
        // "123-" strips to nothing, so the scan keeps going
        assert_eq!(
            extractor.title_from_url("https://acme.io/site-reliability/123-"),
            "Site Reliability"
        );
    }

    #[test]
    fn test_title_minor_words() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        assert_eq!(extractor.format_title("vp-of-sales-and-marketing"), "Vp of Sales and Marketing");
        assert_eq!(extractor.format_title("the-head-of-DATA"), "The Head of Data");
        assert_eq!(extractor.format_title(""), "Job Opportunity");
    }

    #[test]
    fn test_company_rules() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        let cases = [
            ("https://careers.google.com/jobs/results/1", "Google"),
            ("https://www.indeed.com/viewjob?jk=abc", "Indeed"),
            ("https://jobs.lever.co/acme-labs/5d2f", "Acme Labs"),
            ("https://jobs.lever.co/", "Lever"),
            ("https://www.linkedin.com/jobs/view/1", "LinkedIn Job"),
            ("https://careers.acme.com/openings/7", "Acme"),
            ("https://talent.globex.co.uk/x", "Globex"),
            ("https://app.initech.io/roles", "App"),
            ("https://initech.io/roles", "Initech"),
            ("https://www.dropbox.com/jobs", "Dropbox"),
        ];
        for (url, expected) in cases {
            assert_eq!(extractor.company_from_url(url), expected, "for {url}");
        }
    }

    #[test]
    fn test_company_for_ats_board_without_slug() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        assert_eq!(extractor.company_from_url("https://boards.greenhouse.io/"), "Greenhouse");
        assert_eq!(extractor.company_from_url("https://greenhouse.io"), "Greenhouse");
        assert_eq!(extractor.company_from_url("https://api.lever.co/"), "Lever");
        assert_eq!(
            extractor.company_from_url("https://boards.greenhouse.io/initech"),
            "Initech"
        );
    }

    #[test]
    fn test_company_unknown_for_reserved_and_ip_hosts() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        assert_eq!(extractor.company_from_url("https://news.example.com/weather"), "Unknown Company");
        assert_eq!(extractor.company_from_url("http://localhost:3000/jobs"), "Unknown Company");
        assert_eq!(extractor.company_from_url("http://192.168.1.10/jobs"), "Unknown Company");
        assert_eq!(extractor.company_from_url("https://hr.acme.test/jobs"), "Unknown Company");
        assert_eq!(extractor.company_from_url("mailto:jobs@acme.io"), "Unknown Company");
    }

    #[test]
    fn test_company_from_subject_patterns() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        assert_eq!(
            extractor.company_from_subject("Interview invitation from Acme Robotics"),
            Some("Acme Robotics".to_string())
        );
        assert_eq!(
            extractor.company_from_subject("Acme Robotics - Senior Backend Engineer"),
            Some("Acme Robotics".to_string())
        );
        assert_eq!(
            extractor.company_from_subject("Thank you for your application to Initech"),
            Some("Initech".to_string())
        );
        assert_eq!(
            extractor.company_from_subject("The team at Stripe is hiring"),
            Some("Stripe".to_string())
        );
        assert_eq!(extractor.company_from_subject("Your application was received"), None);
    }

    #[test]
    fn test_company_from_subject_rejects_generic_words() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        assert_eq!(extractor.company_from_subject("The - weekly digest"), None);
        assert_eq!(extractor.company_from_subject("We - are hiring"), None);
    }

    #[test]
    fn test_title_from_subject_patterns() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        assert_eq!(
            extractor.title_from_subject("Job: Senior Rust Engineer at Acme"),
            Some("Senior Rust Engineer".to_string())
        );
        assert_eq!(
            extractor.title_from_subject("Thank you for your application for the Data Analyst role"),
            Some("Data Analyst".to_string())
        );
        assert_eq!(
            extractor.title_from_subject("Senior Designer position at Figma"),
            Some("Senior Designer".to_string())
        );
        // "New" is a generic lead-in, not a title
        assert_eq!(extractor.title_from_subject("New job alert"), None);
        assert_eq!(extractor.title_from_subject("Lunch on Friday?"), None);
    }

    #[test]
    fn test_subject_overrides_title_but_not_known_company() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        let context = subject("Job: Platform Engineer at Globex");
        let meta = extractor.extract("https://careers.google.com/jobs/results/1", Some(&context));
        assert_eq!(meta.title, "Platform Engineer");
        assert_eq!(meta.company, "Google");
    }

    #[test]
    fn test_subject_fills_unknown_company() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);
        let context = subject("Interview invitation from Acme Robotics");
        let meta = extractor.extract("https://example.com/r/abc", Some(&context));
        assert_eq!(meta.company, "Acme Robotics");
        assert_eq!(meta.title, "Abc");
    }

    #[test]
    fn test_location_and_type_only_from_message_text() {
        let tables = Tables::builtin();
        let extractor = Extractor::new(&tables);

        // Nothing in the URL counts
        let meta = extractor.extract("https://acme.io/jobs/remote-full-time-engineer", None);
        assert_eq!(meta.location, None);
        assert_eq!(meta.job_type, None);

        let context = MessageContext {
            subject: Some("Backend Engineer opening".to_string()),
            sender: None,
            snippet: Some("Full-time role based in Austin, TX".to_string()),
        };
        let meta = extractor.extract("https://acme.io/jobs/backend", Some(&context));
        assert_eq!(meta.location, Some("Austin, TX".to_string()));
        assert_eq!(meta.job_type, Some("Full-time".to_string()));

        let context = MessageContext {
            subject: None,
            sender: None,
            snippet: Some("Join our international engineering team".to_string()),
        };
        let meta = extractor.extract("https://globex.com/careers/backend-engineer", Some(&context));
        assert_eq!(meta.job_type, None);
    }
}
