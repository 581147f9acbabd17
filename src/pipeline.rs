use std::collections::HashSet;

use rayon::prelude::*;
use tracing::debug;

use crate::categorizer::{Categorizer, DEFAULT_TAG_LIMIT};
use crate::classifier::Classifier;
use crate::extractor::Extractor;
use crate::models::{
    BatchOutcome, CandidateLink, Confidence, EnrichedRecord, JobSource, RelatednessVerdict,
};
use crate::normalize::normalize;
use crate::tables::Tables;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Source recorded unless the link sits on a recognised board.
    pub default_source: JobSource,
    pub filter_related: bool,
    // Only consulted when filter_related is on
    pub min_confidence: Confidence,
    pub tag_limit: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            default_source: JobSource::Manual,
            filter_related: true,
            min_confidence: Confidence::Medium,
            tag_limit: DEFAULT_TAG_LIMIT,
        }
    }
}

pub struct Pipeline<'t> {
    classifier: Classifier<'t>,
    extractor: Extractor<'t>,
    categorizer: Categorizer<'t>,
}

impl<'t> Pipeline<'t> {
    pub fn new(tables: &'t Tables) -> Self {
        Self {
            classifier: Classifier::new(tables),
            extractor: Extractor::new(tables),
            categorizer: Categorizer::new(tables),
        }
    }

    pub fn classifier(&self) -> &Classifier<'t> {
        &self.classifier
    }

    pub fn extractor(&self) -> &Extractor<'t> {
        &self.extractor
    }

    pub fn categorizer(&self) -> &Categorizer<'t> {
        &self.categorizer
    }

    /// Classifies, filters, deduplicates and enriches a batch of links.
    ///
    /// `known` holds the identities the store already has for this owner.
    /// Duplicates are checked after filtering, against `known` and against
    /// earlier links of the same batch.
    pub fn run(
        &self,
        links: &[CandidateLink],
        known: &HashSet<String>,
        options: &BatchOptions,
    ) -> BatchOutcome {
        let verdicts: Vec<RelatednessVerdict> = links
            .par_iter()
            .map(|link| self.classifier.classify(link.url.trim(), link.context.as_ref()))
            .collect();

        let mut outcome = BatchOutcome::default();
        let mut seen: HashSet<String> = known.clone();
        let mut survivors: Vec<(&CandidateLink, RelatednessVerdict, String)> = Vec::new();

        for (link, verdict) in links.iter().zip(verdicts) {
            if options.filter_related && !Classifier::meets_floor(&verdict, options.min_confidence) {
                outcome.filtered_count += 1;
                continue;
            }
            let identity = normalize(link.url.trim());
            if !seen.insert(identity.clone()) {
                outcome.duplicate_count += 1;
                continue;
            }
            survivors.push((link, verdict, identity));
        }

        outcome.accepted = survivors
            .into_par_iter()
            .map(|(link, verdict, identity)| self.enrich(link, verdict, identity, options))
            .collect();

        debug!(
            total = links.len(),
            accepted = outcome.accepted.len(),
            filtered = outcome.filtered_count,
            duplicates = outcome.duplicate_count,
            "batch processed"
        );

        outcome
    }

    fn enrich(
        &self,
        link: &CandidateLink,
        verdict: RelatednessVerdict,
        normalized_url: String,
        options: &BatchOptions,
    ) -> EnrichedRecord {
        let url = link.url.trim();
        let context = link.context.as_ref();

        let metadata = self.extractor.extract(url, context);
        let content = context.map(|ctx| ctx.combined_text()).unwrap_or_default();
        let category =
            self.categorizer
                .categorize_with_limit(url, &metadata.title, &content, options.tag_limit);

        let mut tags = self.categorizer.suggest_tags_from_title(&metadata.title);
        for tag in category.tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags.truncate(options.tag_limit);

        let source = verdict
            .matched_source
            .as_deref()
            .and_then(JobSource::from_board_domain)
            .unwrap_or(options.default_source);

        EnrichedRecord {
            url: url.to_string(),
            normalized_url,
            title: metadata.title,
            company: metadata.company,
            location: metadata.location.or(category.location),
            job_type: metadata.job_type.or(category.job_type),
            source,
            tags,
            relatedness: verdict.confidence,
            richness: category.confidence,
            reasons: verdict.reasons,
            context: link.context.clone(),
        }
    }
}
