use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use jobsift::config::Settings;
use jobsift::db::Database;
use jobsift::email::{EmailConfig, MailFetcher};
use jobsift::models::{
    BatchOutcome, CandidateLink, Confidence, JobSource, LinkUpdate, MessageContext,
};
use jobsift::{normalize, BatchOptions, Pipeline};

#[derive(Parser)]
#[command(name = "jobsift")]
#[command(about = "Sort job links out of your inbox - classify, enrich, and track them")]
struct Cli {
    /// Settings file (default: <config dir>/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Whose links to work with (default from settings)
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ContextArgs {
    /// Subject of the message the link came from
    #[arg(long)]
    subject: Option<String>,

    /// Sender of the message
    #[arg(long)]
    sender: Option<String>,

    /// Text from the message body
    #[arg(long)]
    snippet: Option<String>,
}

impl ContextArgs {
    fn into_context(self) -> Option<MessageContext> {
        let context = MessageContext {
            subject: self.subject,
            sender: self.sender,
            snippet: self.snippet,
        };
        (!context.is_empty()).then_some(context)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Print the deduplication identity of a URL
    Normalize {
        url: String,
    },

    /// Score a URL for being a job posting
    Classify {
        url: String,

        #[command(flatten)]
        context: ContextArgs,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the metadata that can be recovered for a URL
    Extract {
        url: String,

        #[command(flatten)]
        context: ContextArgs,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Save job links
    Add {
        /// One or more URLs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Source to record when the URL is not on a known board
        #[arg(long)]
        source: Option<JobSource>,

        /// Keep links even if they do not look job-related
        #[arg(long)]
        no_filter: bool,

        /// Lowest relatedness to keep: low, medium, high (default from settings)
        #[arg(long)]
        min_confidence: Option<Confidence>,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Pull job links from email
    Email {
        /// Mail account (default from settings)
        #[arg(short, long)]
        username: Option<String>,

        /// Path to app password file (default from settings)
        #[arg(short, long)]
        password_file: Option<String>,

        /// Number of days to look back
        #[arg(short, long, default_value = "7")]
        days: u32,

        /// Show what would be saved without saving
        #[arg(long)]
        dry_run: bool,

        /// Keep links even if they do not look job-related
        #[arg(long)]
        no_filter: bool,

        /// Lowest relatedness to keep: low, medium, high (default from settings)
        #[arg(long)]
        min_confidence: Option<Confidence>,
    },

    /// List saved links
    List {
        /// Filter by status (saved, applied, interview, rejected, offer)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by source (gmail, manual, linkedin, indeed, glassdoor, other)
        #[arg(long)]
        source: Option<String>,
    },

    /// Show link details
    Show {
        id: i64,
    },

    /// Correct or annotate a saved link
    Update {
        id: i64,

        #[arg(short, long)]
        status: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        company: Option<String>,

        /// Location ("" clears it)
        #[arg(long)]
        location: Option<String>,

        /// Employment type, e.g. Full-time ("" clears it)
        #[arg(long)]
        job_type: Option<String>,

        /// Replace tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a saved link
    Delete {
        id: i64,
    },

    /// Counts by status and source
    Stats,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn open_db() -> Result<Database> {
    let db = Database::open()?;
    db.ensure_initialized()?;
    Ok(db)
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            Path::new(&home).join(rest)
        }
        None => PathBuf::from(path),
    }
}

/// Dedups against the store, runs the batch and (unless `dry_run`) saves it.
fn save_links(
    db: &Database,
    pipeline: &Pipeline,
    owner: &str,
    links: &[CandidateLink],
    options: &BatchOptions,
    dry_run: bool,
) -> Result<(BatchOutcome, usize)> {
    let identities: Vec<String> = links.iter().map(|l| normalize(l.url.trim())).collect();
    let known = db.known_identities(owner, &identities)?;

    let outcome = pipeline.run(links, &known, options);
    let saved = if dry_run {
        0
    } else {
        db.insert_records(owner, &outcome.accepted)?
    };
    Ok((outcome, saved))
}

fn print_outcome(outcome: &BatchOutcome, saved: usize, dry_run: bool) {
    for record in &outcome.accepted {
        println!(
            "  {:<8} {:<30} {:<20} {}",
            record.relatedness.as_str(),
            truncate(&record.title, 28),
            truncate(&record.company, 18),
            record.url
        );
    }
    println!("\nResults:");
    if dry_run {
        println!("  Would save:   {}", outcome.accepted.len());
    } else {
        println!("  Saved:        {}", saved);
    }
    println!("  Duplicates:   {}", outcome.duplicate_count);
    println!("  Filtered:     {}", outcome.filtered_count);
    if dry_run {
        println!("\n(Dry run - no links were saved)");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;
    let owner = cli.owner.clone().unwrap_or_else(|| settings.owner.clone());
    let tables = settings.tables();
    let pipeline = Pipeline::new(&tables);

    match cli.command {
        Commands::Init => {
            let db = Database::open()?;
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Normalize { url } => {
            println!("{}", normalize(&url));
        }

        Commands::Classify { url, context, json } => {
            let context = context.into_context();
            let verdict = pipeline.classifier().classify(&url, context.as_ref());
            if json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                println!(
                    "Job link: {} ({}, score {})",
                    if verdict.is_job_link { "yes" } else { "no" },
                    verdict.confidence,
                    verdict.score
                );
                if let Some(board) = &verdict.matched_source {
                    println!("Board: {}", board);
                }
                for reason in &verdict.reasons {
                    println!("  - {}", reason);
                }
            }
        }

        Commands::Extract { url, context, json } => {
            let context = context.into_context();
            let metadata = pipeline.extractor().extract(&url, context.as_ref());
            let content = context.as_ref().map(|c| c.combined_text()).unwrap_or_default();
            let category = pipeline.categorizer().categorize_with_limit(
                &url,
                &metadata.title,
                &content,
                settings.tag_limit,
            );
            if json {
                let value = serde_json::json!({
                    "url": url,
                    "normalized_url": normalize(&url),
                    "metadata": metadata,
                    "category": category,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("Title: {}", metadata.title);
                println!("Company: {}", metadata.company);
                if let Some(location) = metadata.location.as_ref().or(category.location.as_ref()) {
                    println!("Location: {}", location);
                }
                if let Some(job_type) = metadata.job_type.as_ref().or(category.job_type.as_ref()) {
                    println!("Type: {}", job_type);
                }
                println!("Source: {}", category.source);
                if !category.tags.is_empty() {
                    println!("Tags: {}", category.tags.join(", "));
                }
                println!("Richness: {}", category.confidence);
            }
        }

        Commands::Add {
            urls,
            source,
            no_filter,
            min_confidence,
            context,
        } => {
            let db = open_db()?;
            let context = context.into_context();
            let links: Vec<CandidateLink> = urls
                .iter()
                .map(|url| url.trim())
                .filter(|url| !url.is_empty())
                .map(|url| CandidateLink {
                    url: url.to_string(),
                    context: context.clone(),
                })
                .collect();
            if links.is_empty() {
                return Err(anyhow!("No valid URLs provided"));
            }

            let mut options = settings.batch_options(JobSource::Manual);
            if let Some(source) = source {
                options.default_source = source;
            }
            if no_filter {
                options.filter_related = false;
            }
            if let Some(floor) = min_confidence {
                options.min_confidence = floor;
            }
            let (outcome, saved) = save_links(&db, &pipeline, &owner, &links, &options, false)?;
            print_outcome(&outcome, saved, false);
        }

        Commands::Email {
            username,
            password_file,
            days,
            dry_run,
            no_filter,
            min_confidence,
        } => {
            let db = open_db()?;
            let password_path = password_file.as_deref().map(expand_home);
            let config = EmailConfig::resolve(
                settings.imap.as_ref(),
                username.as_deref(),
                password_path.as_deref(),
            )?;

            println!("Connecting to {} as {}...", config.server, config.username);
            let fetcher = MailFetcher::new(config);

            println!("Searching for job mail from the last {} days...", days);
            let (links, stats) = fetcher.fetch_candidates(days, &tables.sender_domains)?;
            println!(
                "  Messages: {}  Links: {}  Errors: {}",
                stats.messages_found, stats.links_found, stats.errors
            );

            let mut options = settings.batch_options(JobSource::Gmail);
            if no_filter {
                options.filter_related = false;
            }
            if let Some(floor) = min_confidence {
                options.min_confidence = floor;
            }
            let (outcome, saved) = save_links(&db, &pipeline, &owner, &links, &options, dry_run)?;
            print_outcome(&outcome, saved, dry_run);
        }

        Commands::List { status, source } => {
            let db = open_db()?;
            let links = db.list_links(&owner, status.as_deref(), source.as_deref())?;
            if links.is_empty() {
                println!("No links found.");
            } else {
                println!(
                    "{:<6} {:<10} {:<30} {:<20} {:<10} {:<8}",
                    "ID", "STATUS", "TITLE", "COMPANY", "SOURCE", "MATCH"
                );
                println!("{}", "-".repeat(88));
                for link in links {
                    println!(
                        "{:<6} {:<10} {:<30} {:<20} {:<10} {:<8}",
                        link.id,
                        link.status,
                        truncate(&link.title, 28),
                        truncate(&link.company, 18),
                        link.source,
                        link.relatedness
                    );
                }
            }
        }

        Commands::Show { id } => {
            let db = open_db()?;
            match db.get_link(&owner, id)? {
                Some(link) => {
                    println!("Link #{}", link.id);
                    println!("Title: {}", link.title);
                    println!("Company: {}", link.company);
                    println!("Status: {}", link.status);
                    println!("URL: {}", link.url);
                    println!("Identity: {}", link.normalized_url);
                    if let Some(location) = &link.location {
                        println!("Location: {}", location);
                    }
                    if let Some(job_type) = &link.job_type {
                        println!("Type: {}", job_type);
                    }
                    println!("Source: {}", link.source);
                    println!("Job match: {}  Detail: {}", link.relatedness, link.richness);
                    if !link.tags.is_empty() {
                        println!("Tags: {}", link.tags.join(", "));
                    }
                    if let Some(subject) = &link.email_subject {
                        println!("Email subject: {}", subject);
                    }
                    if let Some(sender) = &link.email_sender {
                        println!("Email sender: {}", sender);
                    }
                    if let Some(notes) = &link.notes {
                        println!("Notes: {}", notes);
                    }
                    println!("Created: {}", link.created_at);
                    println!("Updated: {}", link.updated_at);
                }
                None => {
                    println!("Link #{} not found.", id);
                }
            }
        }

        Commands::Update {
            id,
            status,
            title,
            company,
            location,
            job_type,
            tags,
            clear_tags,
            notes,
        } => {
            let db = open_db()?;
            let tags = if clear_tags {
                Some(Vec::new())
            } else if tags.is_empty() {
                None
            } else {
                Some(tags)
            };
            let update = LinkUpdate {
                status,
                title,
                company,
                location,
                job_type,
                tags,
                notes,
            };
            if db.update_link(&owner, id, &update)? {
                println!("Updated link #{}.", id);
            } else {
                println!("Link #{} not found.", id);
            }
        }

        Commands::Delete { id } => {
            let db = open_db()?;
            if db.delete_link(&owner, id)? {
                println!("Deleted link #{}.", id);
            } else {
                println!("Link #{} not found.", id);
            }
        }

        Commands::Stats => {
            let db = open_db()?;
            let stats = db.stats(&owner)?;
            println!("Links for {}: {}", owner, stats.total);
            println!("\nBy status:");
            for (status, count) in &stats.by_status {
                println!("  {:<10} {:>5}", status, count);
            }
            if !stats.by_source.is_empty() {
                println!("\nBy source:");
                for (source, count) in &stats.by_source {
                    println!("  {:<10} {:>5}", source, count);
                }
            }
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
