use url::Url;

use crate::models::{CategoryResult, Confidence, JobSource, DEFAULT_TITLE};
use crate::signals::{detect_employment_type, detect_location};
use crate::tables::{first_group, host_matches, Tables};

pub const DEFAULT_TAG_LIMIT: usize = 5;

// What was recovered for a link, independent of whether it is a job at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Richness {
    pub has_title: bool,
    pub has_company: bool,
    pub has_job_type: bool,
    pub has_location: bool,
    pub known_source: bool,
}

impl Richness {
    pub fn score(&self) -> u32 {
        let mut score = 0;
        if self.has_title {
            score += 25;
        }
        if self.has_company {
            score += 25;
        }
        if self.has_job_type {
            score += 15;
        }
        if self.has_location {
            score += 15;
        }
        if self.known_source {
            score += 20;
        }
        score
    }

    pub fn tier(&self) -> Confidence {
        match self.score() {
            s if s >= 70 => Confidence::High,
            s if s >= 40 => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

pub struct Categorizer<'t> {
    tables: &'t Tables,
}

impl<'t> Categorizer<'t> {
    pub fn new(tables: &'t Tables) -> Self {
        Self { tables }
    }

    pub fn detect_source(&self, url: &str) -> JobSource {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
        else {
            return JobSource::Other;
        };

        self.tables
            .sources
            .iter()
            .find(|(domain, _)| host_matches(&host, domain))
            .map(|(_, source)| *source)
            .unwrap_or(JobSource::Other)
    }

    // Up to `limit` distinct tags, in catalog order.
    pub fn extract_tags(&self, text: &str, limit: usize) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for group in &self.tables.tags {
            if tags.len() >= limit {
                break;
            }
            if group.matches(text) && !tags.contains(&group.label) {
                tags.push(group.label.clone());
            }
        }
        tags
    }

    pub fn suggest_tags_from_title(&self, title: &str) -> Vec<String> {
        let rules = &self.tables.title_tags;
        let mut tags: Vec<String> = Vec::new();

        if let Some(label) = first_group(&rules.seniority, title) {
            tags.push(label.to_string());
        }

        if rules.engineering.iter().any(|re| re.is_match(title)) {
            if let Some(label) = first_group(&rules.engineering_family, title) {
                tags.push(label.to_string());
            }
        }

        for group in &rules.families {
            if group.matches(title) && !tags.contains(&group.label) {
                tags.push(group.label.clone());
            }
        }

        tags.truncate(rules.limit);
        tags
    }

    pub fn categorize(&self, url: &str, title: &str, content: &str) -> CategoryResult {
        self.categorize_with_limit(url, title, content, DEFAULT_TAG_LIMIT)
    }

    pub fn categorize_with_limit(
        &self,
        url: &str,
        title: &str,
        content: &str,
        tag_limit: usize,
    ) -> CategoryResult {
        let combined = format!("{} {}", title, content);
        let combined = combined.trim();

        let source = self.detect_source(url);
        let job_type = detect_employment_type(self.tables, combined);
        let location = detect_location(self.tables, combined);
        let tags = self.extract_tags(combined, tag_limit);

        let richness = Richness {
            has_title: !title.is_empty() && title != DEFAULT_TITLE,
            has_company: content
                .to_lowercase()
                .contains(self.tables.company_indicator.as_str()),
            has_job_type: job_type.is_some(),
            has_location: location.is_some(),
            known_source: source.is_known_platform(),
        };

        CategoryResult {
            source,
            job_type,
            location,
            tags,
            confidence: richness.tier(),
        }
    }
}
