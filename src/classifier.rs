use rayon::prelude::*;
use tracing::debug;
use url::Url;

use crate::models::{CandidateLink, Confidence, MessageContext, RelatednessVerdict};
use crate::tables::{match_domain, Tables};

/// Score at or above which a link counts as job-related (and medium tier).
pub const RELATED_THRESHOLD: u32 = 30;
/// Score at or above which the verdict is high confidence.
pub const HIGH_THRESHOLD: u32 = 50;

pub fn tier_for_score(score: u32) -> Confidence {
    if score >= HIGH_THRESHOLD {
        Confidence::High
    } else if score >= RELATED_THRESHOLD {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Extracts the domain part of a sender such as `"Jobs <jobs@linkedin.com>"`.
fn sender_domain(sender: &str) -> String {
    let lower = sender.trim().to_lowercase();
    let domain = match lower.rfind('@') {
        Some(idx) => &lower[idx + 1..],
        None => lower.as_str(),
    };
    domain
        .trim_matches(|c: char| c == '>' || c == '<' || c.is_whitespace())
        .to_string()
}

pub struct Classifier<'t> {
    tables: &'t Tables,
}

impl<'t> Classifier<'t> {
    pub fn new(tables: &'t Tables) -> Self {
        Self { tables }
    }

    /// Known job board the URL's host belongs to, if any.
    pub fn job_board(&self, url: &Url) -> Option<&'t str> {
        let host = url.host_str()?.to_lowercase();
        match_domain(&self.tables.job_boards, &host, url.path())
    }

    fn has_path_pattern(&self, url: &Url) -> bool {
        let mut path_and_query = url.path().to_string();
        if let Some(query) = url.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }
        self.tables
            .path_patterns
            .iter()
            .any(|re| re.is_match(&path_and_query))
    }

    fn has_keyword(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.tables
            .url_keywords
            .iter()
            .any(|keyword| lower.contains(keyword.as_str()))
    }

    fn is_job_subject(&self, subject: &str) -> bool {
        self.tables
            .subject_patterns
            .iter()
            .any(|re| re.is_match(subject))
    }

    fn is_job_sender(&self, sender: &str) -> bool {
        let domain = sender_domain(sender);
        !domain.is_empty() && match_domain(&self.tables.sender_domains, &domain, "").is_some()
    }

    fn snippet_terms(&self, snippet: &str) -> Vec<&'t str> {
        let lower = snippet.to_lowercase();
        self.tables
            .snippet_terms
            .iter()
            .filter(|term| lower.contains(term.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Scores a URL (plus optional message context) for being a job posting.
    pub fn classify(&self, url: &str, context: Option<&MessageContext>) -> RelatednessVerdict {
        let weights = &self.tables.weights;
        let mut reasons = Vec::new();
        let mut score = 0;

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(url = %url, error = %e, "unparseable url, not a job link");
                return RelatednessVerdict {
                    url: url.to_string(),
                    is_job_link: false,
                    confidence: Confidence::Low,
                    score: 0,
                    matched_source: None,
                    reasons,
                };
            }
        };

        let board = self.job_board(&parsed);
        if let Some(domain) = board {
            reasons.push(format!("URL is from known job board: {}", domain));
            score += weights.job_board;
        }

        if self.has_path_pattern(&parsed) {
            reasons.push("URL path matches job-related patterns".to_string());
            score += weights.path_pattern;
        }

        if self.has_keyword(url) {
            reasons.push("URL contains job-related keywords".to_string());
            score += weights.url_keyword;
        }

        if let Some(ctx) = context {
            if ctx.subject.as_deref().is_some_and(|s| self.is_job_subject(s)) {
                reasons.push("Message subject indicates job-related content".to_string());
                score += weights.subject;
            }

            if ctx.sender.as_deref().is_some_and(|s| self.is_job_sender(s)) {
                reasons.push("Message sender is from known job platform".to_string());
                score += weights.sender;
            }

            if let Some(snippet) = &ctx.snippet {
                let found = self.snippet_terms(snippet);
                if found.len() >= weights.snippet_min_terms {
                    reasons.push(format!("Message snippet contains job terms: {}", found.join(", ")));
                    score += weights.snippet;
                }
            }
        }

        RelatednessVerdict {
            url: url.to_string(),
            is_job_link: score >= RELATED_THRESHOLD,
            confidence: tier_for_score(score),
            score,
            matched_source: board.map(str::to_string),
            reasons,
        }
    }

    /// Job-related and at or above `min_confidence`.
    pub fn meets_floor(verdict: &RelatednessVerdict, min_confidence: Confidence) -> bool {
        verdict.is_job_link && verdict.confidence >= min_confidence
    }

    pub fn classify_link(&self, link: &CandidateLink) -> RelatednessVerdict {
        self.classify(&link.url, link.context.as_ref())
    }

    /// Verdicts for the links that are job-related at or above `min_confidence`,
    /// in input order.
    pub fn filter_related(
        &self,
        links: &[CandidateLink],
        min_confidence: Confidence,
    ) -> Vec<RelatednessVerdict> {
        links
            .par_iter()
            .map(|link| self.classify_link(link))
            .collect::<Vec<_>>()
            .into_iter()
            .filter(|verdict| Self::meets_floor(verdict, min_confidence))
            .collect()
    }
}
