use anyhow::{anyhow, Context, Result};
use mailparse::{parse_mail, MailHeaderMap};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ImapSettings;
use crate::models::{CandidateLink, MessageContext};

const SNIPPET_CHARS: usize = 200;

const SUBJECT_KEYWORDS: [&str; 8] = [
    "job",
    "career",
    "position",
    "opportunity",
    "hiring",
    "interview",
    "application",
    "recruit",
];

pub struct EmailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl EmailConfig {
    pub fn gmail(username: &str, app_password: &str) -> Self {
        Self {
            server: "imap.gmail.com".to_string(),
            port: 993,
            username: username.to_string(),
            password: app_password.trim().to_string(),
        }
    }

    pub fn from_gmail_password_file(username: &str, password_file: &Path) -> Result<Self> {
        let password = fs::read_to_string(password_file)
            .with_context(|| format!("Failed to read password file: {:?}", password_file))?;
        Ok(Self::gmail(username, &password))
    }

    // Builds a config from the settings file, with command-line values
    // taking precedence.
    pub fn resolve(
        settings: Option<&ImapSettings>,
        username: Option<&str>,
        password_file: Option<&Path>,
    ) -> Result<Self> {
        let defaults = ImapSettings::default();
        let settings = settings.unwrap_or(&defaults);

        let username = username
            .or(settings.username.as_deref())
            .ok_or_else(|| anyhow!("No IMAP username. Pass --username or set imap.username in config"))?;
        let password_file = password_file
            .or(settings.password_file.as_deref())
            .ok_or_else(|| {
                anyhow!("No password file. Pass --password-file or set imap.password_file in config")
            })?;

        let mut config = Self::from_gmail_password_file(username, password_file)?;
        config.server = settings.server.clone();
        config.port = settings.port;
        Ok(config)
    }
}

#[derive(Debug, Default)]
pub struct FetchStats {
    pub messages_found: usize,
    pub links_found: usize,
    pub errors: usize,
}

pub struct MailFetcher {
    config: EmailConfig,
}

impl MailFetcher {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    // Pulls candidate links out of recent job-related mail.
    // Messages are found by sender domain and by subject keyword; a message
    // matched by several queries is read once. A message that fails to
    // fetch or parse is counted and skipped.
    pub fn fetch_candidates(
        &self,
        days: u32,
        sender_domains: &[String],
    ) -> Result<(Vec<CandidateLink>, FetchStats)> {
        let tls = native_tls::TlsConnector::builder().build()?;

        let addr = (self.config.server.as_str(), self.config.port);
        let tcp = std::net::TcpStream::connect(addr)
            .context("Failed to connect to IMAP server")?;
        tcp.set_read_timeout(Some(std::time::Duration::from_secs(30)))?;
        tcp.set_write_timeout(Some(std::time::Duration::from_secs(30)))?;
        let tls_stream = tls.connect(&self.config.server, tcp)?;

        let client = imap::Client::new(tls_stream);
        let mut session = client
            .login(&self.config.username, &self.config.password)
            .map_err(|e| anyhow!("Login failed: {}", e.0))?;

        session.select("INBOX")?;

        let since_date = chrono::Utc::now() - chrono::Duration::days(days as i64);
        let date_str = since_date.format("%d-%b-%Y").to_string();

        let mut stats = FetchStats::default();
        let mut links = Vec::new();
        let mut seen_message_ids: HashSet<u32> = HashSet::new();

        for query in search_queries(sender_domains, &date_str) {
            let message_ids = match session.search(&query) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(query = %query, error = %e, "mail search failed");
                    continue;
                }
            };

            let mut new_ids: Vec<u32> = message_ids
                .into_iter()
                .filter(|id| seen_message_ids.insert(*id))
                .collect();
            new_ids.sort_unstable();
            debug!(query = %query, messages = new_ids.len(), "mail search");

            for id in new_ids {
                stats.messages_found += 1;

                let messages = match session.fetch(id.to_string(), "RFC822") {
                    Ok(messages) => messages,
                    Err(e) => {
                        stats.errors += 1;
                        warn!(uid = id, error = %e, "failed to fetch message");
                        continue;
                    }
                };
                for message in messages.iter() {
                    if let Some(body) = message.body() {
                        match parse_message(body) {
                            Ok(found) => {
                                stats.links_found += found.len();
                                links.extend(found);
                            }
                            Err(e) => {
                                stats.errors += 1;
                                warn!(uid = id, error = %e, "failed to parse message");
                            }
                        }
                    }
                }
            }
        }

        session.logout()?;
        info!(
            messages = stats.messages_found,
            links = stats.links_found,
            errors = stats.errors,
            "mail fetch finished"
        );
        Ok((links, stats))
    }
}

fn search_queries(sender_domains: &[String], date_str: &str) -> Vec<String> {
    let from = sender_domains
        .iter()
        .map(|domain| format!("FROM \"{}\" SINCE {}", domain, date_str));
    let subject = SUBJECT_KEYWORDS
        .iter()
        .map(|keyword| format!("SUBJECT \"{}\" SINCE {}", keyword, date_str));
    from.chain(subject).collect()
}

// Candidate links from one raw RFC 822 message, each carrying the
// message's subject, sender and snippet.
pub fn parse_message(raw: &[u8]) -> Result<Vec<CandidateLink>> {
    let parsed = parse_mail(raw)?;

    let subject = parsed.headers.get_first_value("Subject");
    let sender = parsed.headers.get_first_value("From");

    let (body, is_html) = get_email_body(&parsed)?;

    let (urls, page_text) = if is_html {
        let document = Html::parse_document(&body);
        let mut urls = anchor_hrefs(&document);
        let text = visible_text(&document);
        urls.extend(extract_urls(&text)?);
        (urls, text)
    } else {
        (extract_urls(&body)?, body)
    };

    let context = MessageContext {
        subject: subject.filter(|s| !s.trim().is_empty()),
        sender: sender.filter(|s| !s.trim().is_empty()),
        snippet: Some(snippet(&page_text)).filter(|s| !s.is_empty()),
    };

    let mut seen = HashSet::new();
    Ok(urls
        .into_iter()
        .filter(|url| is_web_url(url))
        .filter(|url| seen.insert(url.clone()))
        .map(|url| CandidateLink::with_context(url, context.clone()))
        .collect())
}

// The HTML part if there is one, else plain text. The flag says which.
fn get_email_body(parsed: &mailparse::ParsedMail) -> Result<(String, bool)> {
    if parsed.subparts.is_empty() {
        let is_html = parsed.ctype.mimetype.eq_ignore_ascii_case("text/html");
        return Ok((parsed.get_body()?, is_html));
    }

    for mimetype in ["text/html", "text/plain"] {
        if let Some(part) = find_part(parsed, mimetype) {
            return Ok((part.get_body()?, mimetype == "text/html"));
        }
    }

    Err(anyhow!("No email body found"))
}

// Depth-first search for the first part with the given mime type.
fn find_part<'a>(
    parsed: &'a mailparse::ParsedMail<'a>,
    mimetype: &str,
) -> Option<&'a mailparse::ParsedMail<'a>> {
    if parsed.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        return Some(parsed);
    }
    parsed
        .subparts
        .iter()
        .find_map(|part| find_part(part, mimetype))
}

fn anchor_hrefs(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect()
}

const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

fn visible_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|element| HIDDEN_TAGS.contains(&element.name()))
            });
            (!hidden).then_some(&**text)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// Every http(s) URL in free text, trailing punctuation trimmed, first
// occurrence kept.
pub fn extract_urls(text: &str) -> Result<Vec<String>> {
    let url_re = Regex::new(r#"(?i)https?://[^\s<>"{}|\\^`\[\]]+"#)?;
    let mut seen = HashSet::new();
    Ok(url_re
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', '!', '?']).to_string())
        .filter(|url| !url.is_empty())
        .filter(|url| seen.insert(url.clone()))
        .collect())
}

fn is_web_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

pub fn snippet(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(SNIPPET_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML_ALERT: &str = "From: LinkedIn Job Alerts <jobs-noreply@linkedin.com>\r\n\
Subject: New job alert: Senior Rust Engineer\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain part https://plain.example.org/only-in-text\r\n\
--XYZ\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><head><style>p { color: red; }</style></head><body>\
<p>Senior   Rust Engineer at Acme.</p>\
<a href=\"https://www.linkedin.com/comm/jobs/view/123?trk=eml&amp;refId=1\">View job</a>\
<a href=\"mailto:jobs@acme.io\">Mail us</a>\
<a href=\"https://www.linkedin.com/comm/jobs/view/123?trk=eml&amp;refId=1\">Again</a>\
<p>Apply at https://acme.io/careers/rust-engineer.</p>\
</body></html>\r\n\
--XYZ--\r\n";

    const PLAIN_MESSAGE: &str = "From: recruiter@acme.io\r\n\
Subject: Backend role at Acme\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Hi!\r\n\
\r\n\
Details: https://acme.io/jobs/42, and https://acme.io/jobs/42!\r\n\
Or ftp://files.acme.io/jd.pdf\r\n";

    #[test]
    fn test_extract_urls_trims_and_dedupes() {
        let text = "See https://a.io/jobs/1. Also https://a.io/jobs/1, and http://b.io/x?y=1!";
        assert_eq!(
            extract_urls(text).unwrap(),
            vec!["https://a.io/jobs/1", "http://b.io/x?y=1"]
        );
        assert!(extract_urls("").unwrap().is_empty());
        assert!(extract_urls("no links here").unwrap().is_empty());
    }

    #[test]
    fn test_extract_urls_stops_at_delimiters() {
        let text = r#"<a href="https://a.io/jobs/2">x</a> [https://b.io/c] "https://d.io/e""#;
        assert_eq!(
            extract_urls(text).unwrap(),
            vec!["https://a.io/jobs/2", "https://b.io/c", "https://d.io/e"]
        );
    }

    #[test]
    fn test_snippet_collapses_whitespace_and_truncates() {
        assert_eq!(snippet("  Senior \n\n Rust\tEngineer  "), "Senior Rust Engineer");
        let long = "word ".repeat(100);
        assert_eq!(snippet(&long).chars().count(), 200);
        assert_eq!(snippet(""), "");
    }

    #[test]
    fn test_parse_html_message() {
        let links = parse_message(HTML_ALERT.as_bytes()).unwrap();
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.linkedin.com/comm/jobs/view/123?trk=eml&refId=1",
                "https://acme.io/careers/rust-engineer",
            ]
        );

        let context = links[0].context.as_ref().unwrap();
        assert_eq!(context.subject.as_deref(), Some("New job alert: Senior Rust Engineer"));
        assert_eq!(
            context.sender.as_deref(),
            Some("LinkedIn Job Alerts <jobs-noreply@linkedin.com>")
        );
        let snippet = context.snippet.as_deref().unwrap();
        assert!(snippet.starts_with("Senior Rust Engineer at Acme."));
        assert!(!snippet.contains("color"));
    }

    #[test]
    fn test_visible_text_skips_scripts_and_styles() {
        let document = Html::parse_document(
            "<html><body><p>Backend Engineer</p>\
             <script>var mode = \"remote full-time\"; load(\"https://cdn.acme.io/t.js\");</script>\
             <style>.hero { color: blue; }</style>\
             <noscript>Enable JavaScript</noscript>\
             <div>Austin, TX</div></body></html>",
        );
        let text = visible_text(&document);
        assert!(text.contains("Backend Engineer"));
        assert!(text.contains("Austin, TX"));
        assert!(!text.contains("remote"));
        assert!(!text.contains("cdn.acme.io"));
        assert!(!text.contains("color"));
        assert!(!text.contains("JavaScript"));
    }

    #[test]
    fn test_parse_plain_message() {
        let links = parse_message(PLAIN_MESSAGE.as_bytes()).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://acme.io/jobs/42");
        let context = links[0].context.as_ref().unwrap();
        assert_eq!(context.sender.as_deref(), Some("recruiter@acme.io"));
        assert!(context.snippet.as_deref().unwrap().starts_with("Hi! Details:"));
    }

    #[test]
    fn test_is_web_url() {
        assert!(is_web_url("https://acme.io/jobs"));
        assert!(is_web_url("http://acme.io"));
        assert!(!is_web_url("mailto:jobs@acme.io"));
        assert!(!is_web_url("ftp://files.acme.io/jd.pdf"));
        assert!(!is_web_url("/relative/path"));
    }

    #[test]
    fn test_search_queries() {
        let queries = search_queries(&["linkedin.com".to_string()], "01-Jan-2026");
        assert_eq!(queries[0], "FROM \"linkedin.com\" SINCE 01-Jan-2026");
        assert_eq!(queries.len(), 1 + SUBJECT_KEYWORDS.len());
        assert!(queries.contains(&"SUBJECT \"interview\" SINCE 01-Jan-2026".to_string()));
    }

    #[test]
    fn test_gmail_config_trims_password() {
        let config = EmailConfig::gmail("me@gmail.com", "abcd efgh ijkl mnop\n");
        assert_eq!(config.password, "abcd efgh ijkl mnop");
        assert_eq!(config.server, "imap.gmail.com");
        assert_eq!(config.port, 993);
    }

    #[test]
    fn test_resolve_requires_username() {
        let err = EmailConfig::resolve(None, None, Some(Path::new("/nonexistent"))).err().expect("expected error");
        assert!(err.to_string().contains("username"));
        let err = EmailConfig::resolve(None, Some("me@gmail.com"), None).err().expect("expected error");
        assert!(err.to_string().contains("password file"));
    }
}
