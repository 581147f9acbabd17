use regex::{Match, Regex};
use tracing::warn;

use crate::models::JobSource;

// A label plus the patterns that select it. Any pattern matching selects
// the label; within an ordered list of groups the first group wins.
#[derive(Debug, Clone)]
pub struct PatternGroup {
    pub label: String,
    pub patterns: Vec<Regex>,
}

impl PatternGroup {
    pub fn new(label: &str, patterns: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            patterns: compile(patterns),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

pub fn first_group<'a>(groups: &'a [PatternGroup], text: &str) -> Option<&'a str> {
    groups
        .iter()
        .find(|group| group.matches(text))
        .map(|group| group.label.as_str())
}

// Leftmost match of the first pattern (in list order) that matches at all.
pub fn first_find<'t>(patterns: &[Regex], text: &'t str) -> Option<Match<'t>> {
    patterns.iter().find_map(|re| re.find(text))
}

// Compiles a pattern list, skipping (and logging) anything that fails.
pub fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "skipping invalid pattern");
                None
            }
        })
        .collect()
}

// True when `host` is `domain` or a subdomain of it.
pub fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

// Finds the first table entry matching a host. Entries that carry a path
// (`stackoverflow.com/jobs`) are compared as a prefix of `host + path`.
pub fn match_domain<'a>(domains: &'a [String], host: &str, path: &str) -> Option<&'a str> {
    domains
        .iter()
        .find(|entry| match entry.split_once('/') {
            Some((domain, prefix)) => {
                host_matches(host, domain)
                    && path.trim_start_matches('/').starts_with(prefix)
            }
            None => host_matches(host, entry),
        })
        .map(String::as_str)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalWeights {
    pub job_board: u32,
    pub path_pattern: u32,
    pub url_keyword: u32,
    pub subject: u32,
    pub sender: u32,
    pub snippet: u32,
    // Distinct snippet terms needed before the snippet signal fires.
    pub snippet_min_terms: usize,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            job_board: 40,
            path_pattern: 30,
            url_keyword: 20,
            subject: 25,
            sender: 20,
            snippet: 15,
            snippet_min_terms: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationPatterns {
    pub remote: Vec<Regex>,
    pub city_state: Vec<Regex>,
    pub cities: Vec<Regex>,
    pub states: Vec<Regex>,
    pub countries: Vec<Regex>,
    // How far past a city name to look for a state code, in chars.
    pub state_window: usize,
}

// Rules behind title-only tag suggestion.
#[derive(Debug, Clone)]
pub struct TitleTagRules {
    pub seniority: Vec<PatternGroup>,
    pub engineering: Vec<Regex>,
    pub engineering_family: Vec<PatternGroup>,
    pub families: Vec<PatternGroup>,
    pub limit: usize,
}

// Every lookup table the pipeline consults. Built once and shared by
// reference; nothing here is mutated after construction.
#[derive(Debug, Clone)]
pub struct Tables {
    pub weights: SignalWeights,
    pub job_boards: Vec<String>,
    pub sender_domains: Vec<String>,
    pub path_patterns: Vec<Regex>,
    pub url_keywords: Vec<String>,
    pub subject_patterns: Vec<Regex>,
    pub snippet_terms: Vec<String>,

    pub title_stopwords: Vec<String>,
    pub minor_words: Vec<String>,
    pub companies: Vec<(String, String)>,
    // ATS host -> label used when the path carries no company slug
    pub path_company_hosts: Vec<(String, String)>,
    pub fixed_company_labels: Vec<(String, String)>,
    pub career_subdomains: Vec<String>,
    pub reserved_hosts: Vec<String>,
    pub reserved_tlds: Vec<String>,
    pub subject_company_patterns: Vec<Regex>,
    pub subject_title_patterns: Vec<Regex>,
    pub subject_company_stopwords: Vec<String>,

    pub sources: Vec<(String, JobSource)>,
    pub employment_types: Vec<PatternGroup>,
    pub location: LocationPatterns,
    pub tags: Vec<PatternGroup>,
    pub title_tags: TitleTagRules,
    pub company_indicator: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Default for Tables {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Tables {
    pub fn builtin() -> Self {
        Self {
            weights: SignalWeights::default(),
            job_boards: strings(&[
                "linkedin.com",
                "indeed.com",
                "glassdoor.com",
                "monster.com",
                "ziprecruiter.com",
                "careerbuilder.com",
                "dice.com",
                "simplyhired.com",
                "lever.co",
                "greenhouse.io",
                "workday.com",
                "myworkdayjobs.com",
                "icims.com",
                "smartrecruiters.com",
                "jobvite.com",
                "breezy.hr",
                "ashbyhq.com",
                "angel.co",
                "wellfound.com",
                "hired.com",
                "stackoverflow.com/jobs",
                "weworkremotely.com",
                "remoteok.com",
                "flexjobs.com",
                "remote.co",
                "builtin.com",
                "themuse.com",
                "idealist.org",
                "usajobs.gov",
                "governmentjobs.com",
                "naukri.com",
                "seek.com.au",
                "reed.co.uk",
                "totaljobs.com",
                "cwjobs.co.uk",
                "stepstone.de",
                "xing.com",
                "hh.ru",
            ]),
            sender_domains: strings(&[
                "linkedin.com",
                "indeed.com",
                "glassdoor.com",
                "monster.com",
                "ziprecruiter.com",
                "dice.com",
                "hired.com",
                "angel.co",
                "wellfound.com",
                "lever.co",
                "greenhouse.io",
                "workday.com",
                "myworkday.com",
                "icims.com",
                "smartrecruiters.com",
                "jobvite.com",
                "ashbyhq.com",
                "breezy.hr",
            ]),
            path_patterns: compile(&[
                r"(?i)/jobs?/",
                r"(?i)/careers?/",
                r"(?i)/positions?/",
                r"(?i)/openings?/",
                r"(?i)/opportunit(?:y|ies)/",
                r"(?i)/vacanc(?:y|ies)/",
                r"(?i)/hiring/",
                r"(?i)/apply/",
                r"(?i)/job-",
                r"(?i)/career-",
                r"(?i)-jobs?/",
                r"(?i)/job_",
                r"(?i)/join-us",
                r"(?i)/join-our-team",
                r"(?i)/work-with-us",
                r"(?i)/employment",
                r"(?i)/recruiting",
            ]),
            url_keywords: strings(&[
                "job",
                "career",
                "position",
                "opening",
                "opportunity",
                "vacancy",
                "hiring",
                "apply",
                "employment",
                "recruit",
                "talent",
                "work-with-us",
                "join-us",
                "join-our-team",
            ]),
            subject_patterns: compile(&[
                r"(?i)job\s*(?:opportunity|opening|position|alert|posting)",
                r"(?i)career\s*(?:opportunity|opening|position)",
                r"(?i)we(?:'re|’re|\s+are)\s*hiring",
                r"(?i)invitation\s*to\s*(?:apply|interview)",
                r"(?i)application\s*(?:received|status|update)",
                r"(?i)thank\s*you\s*for\s*(?:applying|your\s*application)",
                r"(?i)interview\s*(?:invitation|request|schedule)",
                r"(?i)new\s*job\s*(?:match|alert|recommendation)",
                r"(?i)position\s*(?:available|open)",
                r"(?i)join\s*(?:our\s*team|us)",
                r"(?i)talent\s*(?:network|community)",
                r"(?i)recruiter",
                r"(?i)hiring\s*manager",
            ]),
            snippet_terms: strings(&[
                "job",
                "position",
                "role",
                "opportunity",
                "career",
                "apply",
                "hiring",
            ]),

            title_stopwords: strings(&["jobs", "job", "careers", "positions", "apply", "view"]),
            minor_words: strings(&["and", "or", "of", "the", "in", "at", "for"]),
            // lever.co, greenhouse.io and linkedin.com are left out on purpose:
            // the rules after this table handle them.
            companies: pairs(&[
                ("indeed.com", "Indeed"),
                ("glassdoor.com", "Glassdoor"),
                ("monster.com", "Monster"),
                ("ziprecruiter.com", "ZipRecruiter"),
                ("dice.com", "Dice"),
                ("hired.com", "Hired"),
                ("angel.co", "AngelList"),
                ("wellfound.com", "Wellfound"),
                ("workday.com", "Workday"),
                ("google.com", "Google"),
                ("amazon.com", "Amazon"),
                ("amazon.jobs", "Amazon"),
                ("microsoft.com", "Microsoft"),
                ("apple.com", "Apple"),
                ("meta.com", "Meta"),
                ("metacareers.com", "Meta"),
                ("facebook.com", "Meta"),
                ("netflix.com", "Netflix"),
                ("salesforce.com", "Salesforce"),
                ("adobe.com", "Adobe"),
                ("oracle.com", "Oracle"),
                ("ibm.com", "IBM"),
                ("intel.com", "Intel"),
                ("nvidia.com", "NVIDIA"),
                ("spotify.com", "Spotify"),
                ("uber.com", "Uber"),
                ("lyft.com", "Lyft"),
                ("airbnb.com", "Airbnb"),
                ("stripe.com", "Stripe"),
                ("shopify.com", "Shopify"),
                ("twitter.com", "X (Twitter)"),
                ("x.com", "X (Twitter)"),
            ]),
            path_company_hosts: pairs(&[("lever.co", "Lever"), ("greenhouse.io", "Greenhouse")]),
            fixed_company_labels: pairs(&[("linkedin.com", "LinkedIn Job")]),
            career_subdomains: strings(&["careers", "jobs", "work", "talent", "recruiting"]),
            reserved_hosts: strings(&["example.com", "example.org", "example.net", "localhost"]),
            reserved_tlds: strings(&["test", "example", "invalid", "localhost"]),
            subject_company_patterns: compile(&[
                r"(?i)\b(?:at|from|with)\s+([A-Z][A-Za-z0-9\s&]+?)(?:\s+[-–—]|\s*[|:]|\s+is|\s+has|\s*$)",
                r"^([A-Z][A-Za-z0-9\s&]+?)(?:\s+[-–—]|\s*[|:]|\s+is|\s+has)",
                r"(?i)application\s+(?:to|for|at)\s+([A-Z][A-Za-z0-9\s&]+)",
            ]),
            subject_title_patterns: compile(&[
                r"(?i)(?:position|role|job|opportunity):\s*(.+?)(?:\s+at|\s+[-–—]|$)",
                r"(?i)(?:apply for|application for|interested in)\s+(?:the\s+)?(.+?)(?:\s+position|\s+role|\s+at|$)",
                r"(?i)^(.+?)\s+(?:position|role|job|opportunity)\b",
            ]),
            subject_company_stopwords: strings(&["Your", "New", "The", "Job", "We", "Thank"]),

            sources: vec![
                ("linkedin.com".to_string(), JobSource::Linkedin),
                ("indeed.com".to_string(), JobSource::Indeed),
                ("glassdoor.com".to_string(), JobSource::Glassdoor),
                ("lever.co".to_string(), JobSource::Other),
                ("greenhouse.io".to_string(), JobSource::Other),
                ("workday.com".to_string(), JobSource::Other),
                ("myworkdayjobs.com".to_string(), JobSource::Other),
                ("icims.com".to_string(), JobSource::Other),
                ("smartrecruiters.com".to_string(), JobSource::Other),
                ("ashbyhq.com".to_string(), JobSource::Other),
            ],
            employment_types: vec![
                PatternGroup::new("Full-time", &[r"(?i)full[- ]?time", r"(?i)\bft\b", r"(?i)permanent"]),
                PatternGroup::new("Part-time", &[r"(?i)part[- ]?time", r"(?i)\bpt\b"]),
                PatternGroup::new(
                    "Contract",
                    &[r"(?i)contract", r"(?i)consulting", r"(?i)\bc2c\b", r"(?i)corp[- ]?to[- ]?corp"],
                ),
                PatternGroup::new("Freelance", &[r"(?i)freelance", r"(?i)\bgigs?\b"]),
                PatternGroup::new(
                    "Internship",
                    &[r"(?i)\binterns?(?:hips?)?\b", r"(?i)co-op", r"(?i)\bcoop\b", r"(?i)trainee"],
                ),
                PatternGroup::new("Temporary", &[r"(?i)temporary", r"(?i)\btemp\b", r"(?i)seasonal"]),
                PatternGroup::new(
                    "Remote",
                    &[
                        r"(?i)\bremote\b",
                        r"(?i)work from home",
                        r"(?i)\bwfh\b",
                        r"(?i)telecommute",
                        r"(?i)distributed",
                    ],
                ),
                PatternGroup::new("Hybrid", &[r"(?i)hybrid", r"(?i)flexible", r"(?i)partial remote"]),
                PatternGroup::new(
                    "On-site",
                    &[
                        r"(?i)on[- ]?site",
                        r"(?i)in[- ]?office",
                        r"(?i)in[- ]?person",
                        r"(?i)office[- ]?based",
                    ],
                ),
            ],
            location: LocationPatterns {
                remote: compile(&[
                    r"(?i)\b(?:remote|anywhere|worldwide|global|distributed|work from home|wfh)\b",
                ]),
                city_state: compile(&[r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?,\s*[A-Z]{2}\b"]),
                cities: compile(&[
                    r"(?i)\b(?:New York|Los Angeles|Chicago|Houston|Phoenix|Philadelphia|San Antonio|San Diego|Dallas|San Jose|Austin|Jacksonville|Fort Worth|Columbus|Charlotte|San Francisco|Indianapolis|Seattle|Denver|Boston|El Paso|Nashville|Detroit|Portland|Memphis|Louisville|Baltimore|Milwaukee|Albuquerque|Tucson|Fresno|Sacramento|Kansas City|Atlanta|Miami|Raleigh|Omaha|Oakland)\b",
                ]),
                states: compile(&[
                    r"\b(?:AL|AK|AZ|AR|CA|CO|CT|DE|FL|GA|HI|ID|IL|IN|IA|KS|KY|LA|ME|MD|MA|MI|MN|MS|MO|MT|NE|NV|NH|NJ|NM|NY|NC|ND|OH|OK|OR|PA|RI|SC|SD|TN|TX|UT|VT|VA|WA|WV|WI|WY)\b",
                ]),
                countries: compile(&[
                    r"\b(?:(?i:United States|United Kingdom|Canada|Germany|France|Australia|India|Japan|Singapore|Netherlands|Ireland)|USA|US|UK)\b",
                ]),
                state_window: 20,
            },
            tags: vec![
                // Seniority
                PatternGroup::new("Senior", &[r"(?i)senior", r"(?i)\bsr\.?\b", r"(?i)\blead\b"]),
                PatternGroup::new("Junior", &[r"(?i)junior", r"(?i)\bjr\.?\b", r"(?i)entry[- ]?level"]),
                PatternGroup::new("Mid-level", &[r"(?i)mid[- ]?level", r"(?i)mid[- ]?senior"]),
                PatternGroup::new("Principal", &[r"(?i)principal", r"(?i)\bstaff\b", r"(?i)architect"]),
                PatternGroup::new("Management", &[r"(?i)manager", r"(?i)director", r"(?i)head of"]),
                // Stack
                PatternGroup::new("React", &[r"(?i)\breact(?:js)?\b"]),
                PatternGroup::new("Node.js", &[r"(?i)node\.?js"]),
                PatternGroup::new("Python", &[r"(?i)python"]),
                PatternGroup::new("Java", &[r"(?i)\bjava\b"]),
                PatternGroup::new("TypeScript", &[r"(?i)typescript", r"(?i)\bts\b"]),
                PatternGroup::new("JavaScript", &[r"(?i)javascript", r"(?i)\bjs\b"]),
                PatternGroup::new("AWS", &[r"(?i)\baws\b", r"(?i)amazon web services"]),
                PatternGroup::new("Azure", &[r"(?i)azure", r"(?i)microsoft cloud"]),
                PatternGroup::new("GCP", &[r"(?i)google cloud", r"(?i)\bgcp\b"]),
                PatternGroup::new("Kubernetes", &[r"(?i)kubernetes", r"(?i)\bk8s\b"]),
                PatternGroup::new("Docker", &[r"(?i)docker", r"(?i)container"]),
                // Role family
                PatternGroup::new(
                    "Frontend",
                    &[r"(?i)frontend", r"(?i)front[- ]end", r"(?i)ui developer"],
                ),
                PatternGroup::new(
                    "Backend",
                    &[r"(?i)backend", r"(?i)back[- ]end", r"(?i)server[- ]?side"],
                ),
                PatternGroup::new("Full Stack", &[r"(?i)full[- ]?stack"]),
                PatternGroup::new(
                    "DevOps",
                    &[r"(?i)devops", r"(?i)site reliability", r"(?i)\bsre\b"],
                ),
                PatternGroup::new(
                    "Data Science",
                    &[
                        r"(?i)data science",
                        r"(?i)data scientist",
                        r"(?i)\bml\b",
                        r"(?i)machine learning",
                    ],
                ),
                PatternGroup::new(
                    "Mobile",
                    &[
                        r"(?i)mobile",
                        r"(?i)\bios\b",
                        r"(?i)android",
                        r"(?i)flutter",
                        r"(?i)react native",
                    ],
                ),
                // Benefits
                PatternGroup::new(
                    "Visa Sponsorship",
                    &[r"(?i)visa sponsor", r"(?i)\bh-?1b\b", r"(?i)work authorization"],
                ),
                PatternGroup::new("Equity", &[r"(?i)equity", r"(?i)stock options", r"(?i)\brsus?\b"]),
                PatternGroup::new("Startup", &[r"(?i)startup", r"(?i)early[- ]?stage"]),
            ],
            title_tags: TitleTagRules {
                seniority: vec![
                    PatternGroup::new("Senior", &[r"(?i)\b(?:senior|sr\.?|lead|principal|staff)\b"]),
                    PatternGroup::new("Junior", &[r"(?i)\b(?:junior|jr\.?|entry|associate)\b"]),
                ],
                engineering: compile(&[r"(?i)\b(?:engineer|developer|programmer)\b"]),
                engineering_family: vec![
                    PatternGroup::new("Frontend", &[r"(?i)frontend|front[- ]end|\bui\b"]),
                    PatternGroup::new("Backend", &[r"(?i)backend|back[- ]end|server"]),
                    PatternGroup::new("Full Stack", &[r"(?i)full[- ]?stack"]),
                ],
                families: vec![
                    PatternGroup::new("DevOps", &[r"(?i)\b(?:devops|sre|infrastructure|platform)\b"]),
                    PatternGroup::new(
                        "Data Science",
                        &[r"(?i)\b(?:data|ml|machine learning|ai|analytics)\b"],
                    ),
                    PatternGroup::new("Mobile", &[r"(?i)\b(?:mobile|ios|android|flutter)\b"]),
                    PatternGroup::new(
                        "Management",
                        &[r"(?i)\b(?:manager|director|head|vp|chief)\b"],
                    ),
                ],
                limit: 3,
            },
            company_indicator: "company".to_string(),
        }
    }

    // Appends job-board domains not already present.
    pub fn add_job_boards<I, S>(&mut self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for domain in domains {
            let domain = domain.as_ref().trim().to_lowercase();
            if !domain.is_empty() && !self.job_boards.contains(&domain) {
                self.job_boards.push(domain);
            }
        }
    }

    pub fn add_sender_domains<I, S>(&mut self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for domain in domains {
            let domain = domain.as_ref().trim().to_lowercase();
            if !domain.is_empty() && !self.sender_domains.contains(&domain) {
                self.sender_domains.push(domain);
            }
        }
    }

    // Prepends domain -> company mappings so they take precedence over the
    // built-in ones.
    pub fn add_companies(&mut self, companies: &[(String, String)]) {
        let mut merged: Vec<(String, String)> = companies
            .iter()
            .map(|(domain, company)| (domain.trim().to_lowercase(), company.trim().to_string()))
            .filter(|(domain, company)| !domain.is_empty() && !company.is_empty())
            .collect();
        merged.extend(self.companies.drain(..));
        self.companies = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_patterns_all_compile() {
        let tables = Tables::builtin();
        assert_eq!(tables.path_patterns.len(), 17);
        assert_eq!(tables.subject_patterns.len(), 13);
        assert_eq!(tables.subject_company_patterns.len(), 3);
        assert_eq!(tables.subject_title_patterns.len(), 3);
        assert_eq!(tables.location.countries.len(), 1);
        for group in tables.tags.iter().chain(tables.employment_types.iter()) {
            assert!(!group.patterns.is_empty(), "group {} lost its patterns", group.label);
        }
    }

    #[test]
    fn test_compile_skips_invalid_patterns() {
        let compiled = compile(&[r"ok", r"(unclosed", r"\d+"]);
        assert_eq!(compiled.len(), 2);
    }

    #[test]
    fn test_host_matches_on_label_boundary() {
        assert!(host_matches("linkedin.com", "linkedin.com"));
        assert!(host_matches("uk.linkedin.com", "linkedin.com"));
        assert!(!host_matches("notlinkedin.com", "linkedin.com"));
        assert!(!host_matches("dropbox.com", "x.com"));
        assert!(!host_matches("remote.com", "remote.co"));
        assert!(!host_matches("com", "x.com"));
    }

    #[test]
    fn test_match_domain_with_path_entry() {
        let domains = vec!["stackoverflow.com/jobs".to_string(), "lever.co".to_string()];
        assert_eq!(
            match_domain(&domains, "stackoverflow.com", "/jobs/123"),
            Some("stackoverflow.com/jobs")
        );
        assert_eq!(match_domain(&domains, "stackoverflow.com", "/questions/1"), None);
        assert_eq!(match_domain(&domains, "jobs.lever.co", "/acme"), Some("lever.co"));
    }

    #[test]
    fn test_first_group_respects_order() {
        let groups = vec![
            PatternGroup::new("first", &[r"(?i)alpha"]),
            PatternGroup::new("second", &[r"(?i)alpha", r"(?i)beta"]),
        ];
        assert_eq!(first_group(&groups, "Alpha and beta"), Some("first"));
        assert_eq!(first_group(&groups, "beta only"), Some("second"));
        assert_eq!(first_group(&groups, "gamma"), None);
    }

    #[test]
    fn test_add_companies_takes_precedence() {
        let mut tables = Tables::builtin();
        tables.add_companies(&[("google.com".to_string(), "Alphabet".to_string())]);
        assert_eq!(tables.companies[0], ("google.com".to_string(), "Alphabet".to_string()));
        assert!(tables.companies.iter().any(|(_, c)| c == "Google"));
    }

    #[test]
    fn test_add_job_boards_dedupes() {
        let mut tables = Tables::builtin();
        let before = tables.job_boards.len();
        tables.add_job_boards(["LinkedIn.com", "jobs.example.dev"]);
        assert_eq!(tables.job_boards.len(), before + 1);
        assert!(tables.job_boards.contains(&"jobs.example.dev".to_string()));
    }
}
