use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use applytrack::ai::AiClient;
use applytrack::analytics;
use applytrack::config::{self, Config};
use applytrack::db::Database;
use applytrack::email::{EmailConfig, EmailIngester};
use applytrack::models::{
    Application, ApplicationPatch, ApplicationStatus, EventType, JobSource, NewApplication, NewCv, Priority,
    SalaryRange, TimelineEvent,
};
use applytrack::store::{load_applications, ApplicationStore};
use applytrack::tui;
use applytrack::workflow::{BoardSession, MoveOutcome, MoveRequest};

#[derive(Parser)]
#[command(name = "applytrack")]
#[command(about = "Track job applications through your hiring pipeline")]
struct Cli {
    /// Owner whose applications are used (defaults to config, then $USER)
    #[arg(long, global = true)]
    owner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Record a new application
    Add(AddArgs),

    /// List applications, newest first
    List {
        /// Filter by status (saved, applied, phone_screen, interview, ...)
        #[arg(short, long)]
        status: Option<ApplicationStatus>,

        /// Filter by company (substring, case-insensitive)
        #[arg(short, long)]
        company: Option<String>,
    },

    /// Show an application with its timeline
    Show {
        /// Application ID or unique prefix
        id: String,
    },

    /// Move an application to another status
    Move {
        /// Application ID or unique prefix
        id: String,

        /// Target status
        status: ApplicationStatus,

        /// Note recorded on the timeline
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Record that you followed up
    FollowUp {
        /// Application ID or unique prefix
        id: String,

        /// When to follow up next (YYYY-MM-DD)
        #[arg(long)]
        next: Option<String>,

        /// What you did
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Add a timeline event
    Event {
        /// Application ID or unique prefix
        id: String,

        /// Event type (note, email_received, email_sent, interview)
        event_type: EventType,

        /// Description
        description: String,

        /// When it happens (YYYY-MM-DD or "YYYY-MM-DD HH:MM"); sets the interview date for interviews
        #[arg(long)]
        at: Option<String>,
    },

    /// Delete an application
    Delete {
        /// Application ID or unique prefix
        id: String,
    },

    /// Interactive Kanban board
    Board,

    /// Pipeline statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Applications created per week
    Trend {
        /// Number of weeks to show
        #[arg(short, long)]
        weeks: Option<usize>,
    },

    /// Upcoming interviews
    Interviews {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Applications waiting for a follow-up
    FollowUps {
        /// Days without contact before an application is due
        #[arg(short, long)]
        days: Option<i64>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Manage CVs
    Cv {
        #[command(subcommand)]
        command: CvCommands,
    },

    /// Import job leads from email
    Email {
        /// IMAP account
        #[arg(short, long)]
        username: String,

        /// Path to app password file
        #[arg(short, long, default_value = "~/.applytrack.app_password")]
        password_file: String,

        /// IMAP server
        #[arg(long, default_value = "imap.gmail.com")]
        server: String,

        #[arg(long, default_value = "993")]
        port: u16,

        /// Number of days to look back
        #[arg(short, long, default_value = "7")]
        days: u32,

        /// Read emails with the AI model instead of the HTML parsers
        #[arg(long)]
        ai: bool,

        /// AI model (see `ai --help`)
        #[arg(short, long)]
        model: Option<String>,

        /// Show what would be added without adding
        #[arg(long)]
        dry_run: bool,
    },

    /// AI assistance
    Ai {
        /// Model: claude-sonnet (default), claude-opus, claude-haiku, api-sonnet, api-opus, api-haiku, gpt-5.2, gpt-4o, gpt-4o-mini
        #[arg(short, long, global = true)]
        model: Option<String>,

        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Args)]
struct AddArgs {
    /// Job title
    title: String,

    /// Company
    company: String,

    #[arg(short, long, default_value = "")]
    location: String,

    #[arg(long)]
    remote: bool,

    #[arg(short, long)]
    url: Option<String>,

    /// File holding the job description
    #[arg(long)]
    description_file: Option<PathBuf>,

    #[arg(long)]
    salary_min: Option<i64>,

    #[arg(long)]
    salary_max: Option<i64>,

    #[arg(long, default_value = "USD")]
    currency: String,

    #[arg(short, long, default_value = "saved")]
    status: ApplicationStatus,

    /// linkedin, indeed, glassdoor, company_website, referral, recruiter, email, other
    #[arg(long, default_value = "other")]
    source: JobSource,

    #[arg(short, long, default_value = "medium")]
    priority: Priority,

    /// CV ID used for this application
    #[arg(long)]
    cv: Option<String>,

    #[arg(short, long)]
    notes: Option<String>,

    #[arg(short, long)]
    tag: Vec<String>,

    /// Date applied (YYYY-MM-DD)
    #[arg(long)]
    applied: Option<String>,
}

#[derive(Subcommand)]
enum CvCommands {
    /// Register a CV file
    Add {
        /// Display name; re-using a name creates a new version
        name: String,

        /// Path to the CV file
        file: PathBuf,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        tag: Vec<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// List CVs
    List,

    /// Remove a CV
    Rm {
        /// CV ID
        id: String,
    },
}

#[derive(Args)]
struct JobInput {
    /// File holding the job description
    #[arg(long)]
    job_file: Option<PathBuf>,

    /// Use the description stored on an application
    #[arg(short, long)]
    application: Option<String>,
}

#[derive(Subcommand)]
enum AiCommands {
    /// Score a CV against a job description
    Match {
        /// Plain-text CV
        cv_file: PathBuf,

        #[command(flatten)]
        job: JobInput,
    },

    /// Write a cover letter
    CoverLetter {
        /// Plain-text CV
        cv_file: PathBuf,

        #[command(flatten)]
        job: JobInput,

        /// Company (defaults to the application's)
        #[arg(long)]
        company: Option<String>,

        /// Position (defaults to the application's)
        #[arg(long)]
        title: Option<String>,

        /// Anything else the letter should mention
        #[arg(long)]
        extra: Option<String>,

        /// Write the letter to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Break down a job description
    Analyze {
        #[command(flatten)]
        job: JobInput,
    },

    /// Research a company
    Research {
        company: String,

        #[arg(long)]
        context: Option<String>,
    },
}

fn init_logging(default_filter: &str, quiet: bool) {
    // RUST_LOG wins; the board owns the terminal, so it stays silent otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("off")
        } else {
            EnvFilter::new(default_filter)
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_logging(&config.log_filter, matches!(cli.command, Commands::Board));
    if let Some(path) = Config::path().filter(|p| p.exists()) {
        info!(path = %path.display(), "loaded configuration");
    }

    let owner = config.resolve_owner(cli.owner.as_deref());
    let db = Database::open(&config.database_path())?;
    debug!(owner = %owner, db = %db.path().display(), "starting");

    if !matches!(cli.command, Commands::Init) {
        db.ensure_initialized()?;
    }

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Add(args) => {
            let app = db.create_application(&owner, args.into_new_application()?)?;
            println!("Added application {} ({} at {})", short_id(&app.id), app.job_title, app.company);
        }

        Commands::List { status, company } => {
            let company = company.map(|c| c.to_lowercase());
            let apps: Vec<Application> = load_applications(&db, &owner)?
                .into_iter()
                .filter(|a| status.is_none_or(|s| a.status == s))
                .filter(|a| company.as_ref().is_none_or(|c| a.company.to_lowercase().contains(c)))
                .collect();
            if apps.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<9} {:<13} {:<30} {:<20} {:<8} {:>10}",
                    "ID", "STATUS", "TITLE", "COMPANY", "PRIORITY", "CREATED"
                );
                println!("{}", "-".repeat(95));
                for app in apps {
                    println!(
                        "{:<9} {:<13} {:<30} {:<20} {:<8} {:>10}",
                        short_id(&app.id),
                        app.status.as_str(),
                        truncate(&app.job_title, 28),
                        truncate(&app.company, 18),
                        app.priority,
                        app.created_at.with_timezone(&Local).format("%Y-%m-%d")
                    );
                }
            }
        }

        Commands::Show { id } => {
            let app = find_application(&db, &owner, &id)?;
            print_application(&app);
        }

        Commands::Move { id, status, note } => {
            let app = find_application(&db, &owner, &id)?;
            let mut session = BoardSession::open(&db, &owner)?;
            let request = MoveRequest {
                id: app.id.clone(),
                from: app.status,
                to: status,
                to_index: 0,
            };
            match session.drag(&request, note.as_deref())? {
                MoveOutcome::StatusChanged { from, to, .. } => {
                    println!("Moved {} from {} to {}.", short_id(&app.id), from.label(), to.label());
                }
                _ => println!("{} is already {}.", short_id(&app.id), app.status.label()),
            }
        }

        Commands::FollowUp { id, next, note } => {
            let app = find_application(&db, &owner, &id)?;
            let now = Utc::now();
            let description = note.unwrap_or_else(|| "Followed up".to_string());
            let patch = ApplicationPatch {
                last_follow_up_date: Some(now),
                next_follow_up_date: next.as_deref().map(parse_when).transpose()?,
                append_events: vec![TimelineEvent::new(EventType::EmailSent, description, now)],
                ..Default::default()
            };
            db.patch_application(&app.id, &patch)?;
            println!("Recorded follow-up for {} at {}.", app.job_title, app.company);
        }

        Commands::Event {
            id,
            event_type,
            description,
            at,
        } => {
            let event = TimelineEvent::manual(event_type, description, Utc::now())
                .with_context(|| format!("Use `applytrack move {} <status>` to change status", id))?;
            let app = find_application(&db, &owner, &id)?;
            let when = at.as_deref().map(parse_when).transpose()?;
            let patch = ApplicationPatch {
                interview_date: when.filter(|_| event_type == EventType::InterviewScheduled),
                append_events: vec![event],
                ..Default::default()
            };
            db.patch_application(&app.id, &patch)?;
            println!("Added {} event to {}.", event_type.as_str(), short_id(&app.id));
        }

        Commands::Delete { id } => {
            let app = find_application(&db, &owner, &id)?;
            db.delete_application(&app.id)?;
            println!("Deleted {} ({} at {}).", short_id(&app.id), app.job_title, app.company);
        }

        Commands::Board => {
            let session = BoardSession::open(&db, &owner)?;
            tui::run_board(session)?;
        }

        Commands::Stats { json } => {
            let apps = load_applications(&db, &owner)?;
            let now = Local::now();
            let summary = analytics::summarize(&apps, &now);

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!("Applications: {}", summary.total);
            println!("This week:    {}", summary.this_week);
            println!("This month:   {}", summary.this_month);
            println!("Avg response: {:.1} days", summary.average_response_days);
            println!(
                "Conversion:   {:.0}% applied -> interview, {:.0}% interview -> offer",
                summary.conversion.applied_to_interview, summary.conversion.interview_to_offer
            );

            println!("\n{:<14} {:>5}", "STATUS", "COUNT");
            println!("{}", "-".repeat(20));
            for (status, count) in &summary.by_status {
                if *count > 0 || *status != ApplicationStatus::Unrecognized {
                    println!("{:<14} {:>5}", status.label(), count);
                }
            }

            println!("\n{:<16} {:>5}", "SOURCE", "COUNT");
            println!("{}", "-".repeat(22));
            for (source, count) in summary.by_source.iter().filter(|(_, c)| **c > 0) {
                println!("{:<16} {:>5}", source.as_str(), count);
            }

            println!("\n{:<10} {:>5}", "PRIORITY", "COUNT");
            println!("{}", "-".repeat(16));
            for (priority, count) in analytics::count_by_priority(&apps) {
                println!("{:<10} {:>5}", priority.as_str(), count);
            }

            let top = analytics::top_companies(&apps, 5);
            if !top.is_empty() {
                println!("\nTop companies:");
                for entry in top {
                    println!("  {:<24} {:>3}", truncate(&entry.company, 24), entry.count);
                }
            }
        }

        Commands::Trend { weeks } => {
            let apps = load_applications(&db, &owner)?;
            let trend = analytics::weekly_trend(&apps, weeks.unwrap_or(config.trend_weeks), &Local::now());
            let peak = trend.iter().map(|b| b.count).max().unwrap_or(0).max(1);
            println!("{:<7} {:>5}", "WEEK", "COUNT");
            println!("{}", "-".repeat(40));
            for bucket in trend {
                let bar = "#".repeat(bucket.count * 30 / peak);
                println!("{:<7} {:>5} {}", bucket.label, bucket.count, bar);
            }
        }

        Commands::Interviews { limit } => {
            let apps = load_applications(&db, &owner)?;
            let upcoming =
                analytics::upcoming_interviews(&apps, &Local::now(), limit.unwrap_or(config.upcoming_limit));
            if upcoming.is_empty() {
                println!("No upcoming interviews.");
            } else {
                println!("{:<17} {:<9} {:<30} {:<20}", "WHEN", "ID", "TITLE", "COMPANY");
                println!("{}", "-".repeat(78));
                for app in upcoming {
                    let when = app
                        .interview_date
                        .map(|d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!(
                        "{:<17} {:<9} {:<30} {:<20}",
                        when,
                        short_id(&app.id),
                        truncate(&app.job_title, 28),
                        truncate(&app.company, 18)
                    );
                }
            }
        }

        Commands::FollowUps { days, limit } => {
            let apps = load_applications(&db, &owner)?;
            let due = analytics::needing_follow_up(
                &apps,
                &Local::now(),
                days.unwrap_or(config.follow_up_days),
                limit.unwrap_or(config.follow_up_limit),
            );
            if due.is_empty() {
                println!("Nothing needs a follow-up.");
            } else {
                println!("{:<6} {:<9} {:<13} {:<30} {:<20}", "DAYS", "ID", "STATUS", "TITLE", "COMPANY");
                println!("{}", "-".repeat(82));
                for item in due {
                    let app = item.application;
                    println!(
                        "{:<6} {:<9} {:<13} {:<30} {:<20}",
                        item.days_since_contact,
                        short_id(&app.id),
                        app.status.as_str(),
                        truncate(&app.job_title, 28),
                        truncate(&app.company, 18)
                    );
                }
            }
        }

        Commands::Cv { command } => match command {
            CvCommands::Add {
                name,
                file,
                category,
                tag,
                description,
            } => {
                let path = file
                    .canonicalize()
                    .with_context(|| format!("Failed to find CV file: {}", file.display()))?;
                let size = std::fs::metadata(&path)
                    .with_context(|| format!("Failed to read CV file: {}", path.display()))?
                    .len();
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| name.clone());
                let cv = db.add_cv(
                    &owner,
                    NewCv {
                        name,
                        file_name,
                        file_url: format!("file://{}", path.display()),
                        file_size: size,
                        tags: tag,
                        category,
                        description,
                    },
                )?;
                println!("Added CV '{}' v{} (ID: {})", cv.name, cv.version, short_id(&cv.id));
            }

            CvCommands::List => {
                let cvs = db.list_cvs(&owner)?;
                if cvs.is_empty() {
                    println!("No CVs found.");
                } else {
                    println!("{:<9} {:<24} {:<4} {:<14} {:>8} {:<10}", "ID", "NAME", "VER", "CATEGORY", "SIZE", "ADDED");
                    println!("{}", "-".repeat(74));
                    for cv in cvs {
                        println!(
                            "{:<9} {:<24} {:<4} {:<14} {:>8} {:<10}",
                            short_id(&cv.id),
                            truncate(&cv.name, 22),
                            format!("v{}", cv.version),
                            truncate(cv.category.as_deref().unwrap_or("-"), 12),
                            format_size(cv.file_size),
                            cv.created_at.with_timezone(&Local).format("%Y-%m-%d")
                        );
                    }
                }
            }

            CvCommands::Rm { id } => {
                let cv = match db.get_cv(&id)?.filter(|cv| cv.owner_id == owner) {
                    Some(cv) => cv,
                    None => db
                        .list_cvs(&owner)?
                        .into_iter()
                        .find(|cv| cv.id.starts_with(&id))
                        .ok_or_else(|| anyhow!("CV '{}' not found", id))?,
                };
                db.delete_cv(&cv.id)?;
                println!("Removed CV '{}' v{}.", cv.name, cv.version);
            }
        },

        Commands::Email {
            username,
            password_file,
            server,
            port,
            days,
            ai,
            model,
            dry_run,
        } => {
            let password_path = config::expand_home(Path::new(&password_file));
            let email_config = EmailConfig::with_password_file(&server, port, &username, &password_path)?;

            let client = if ai {
                Some(ai_client(&config, model.as_deref())?)
            } else {
                None
            };
            let mut ingester = EmailIngester::new(email_config);
            if let Some(client) = &client {
                ingester = ingester.with_ai(client);
            }

            println!("Searching {} for job emails from the last {} days...", username, days);
            let stats = ingester.fetch_job_alerts(&db, &owner, days, dry_run)?;

            println!("\nResults:");
            println!("  Emails found: {}", stats.emails_found);
            println!("  Jobs found:   {}", stats.jobs_found);
            println!("  Jobs added:   {}", stats.jobs_added);
            println!("  Duplicates:   {}", stats.duplicates);
            if stats.errors > 0 {
                println!("  Errors:       {}", stats.errors);
            }
            if dry_run {
                println!("\n(Dry run - no applications were added)");
            }
        }

        Commands::Ai { model, command } => {
            let client = ai_client(&config, model.as_deref())?;
            match command {
                AiCommands::Match { cv_file, job } => {
                    let cv_text = read_text(&cv_file, "CV")?;
                    let (job_text, _) = job.resolve(&db, &owner)?;
                    let result = client.match_cv(&cv_text, &job_text)?;

                    println!("Match score: {:.0}/100\n", result.score);
                    print_list("Strengths", &result.strengths);
                    print_list("Gaps", &result.gaps);
                    print_list("Recommendations", &result.recommendations);
                    println!("{}", textwrap::fill(&result.summary, 80));
                }

                AiCommands::CoverLetter {
                    cv_file,
                    job,
                    company,
                    title,
                    extra,
                    output,
                } => {
                    let cv_text = read_text(&cv_file, "CV")?;
                    let (job_text, app) = job.resolve(&db, &owner)?;
                    let company = company
                        .or_else(|| app.as_ref().map(|a| a.company.clone()))
                        .ok_or_else(|| anyhow!("--company is required without --application"))?;
                    let title = title
                        .or_else(|| app.as_ref().map(|a| a.job_title.clone()))
                        .ok_or_else(|| anyhow!("--title is required without --application"))?;

                    let letter = client.cover_letter(&cv_text, &job_text, &company, &title, extra.as_deref())?;
                    match output {
                        Some(path) => {
                            std::fs::write(&path, &letter)
                                .with_context(|| format!("Failed to write to {}", path.display()))?;
                            println!("Cover letter saved to: {}", path.display());
                        }
                        None => println!("{}", letter),
                    }
                }

                AiCommands::Analyze { job } => {
                    let (job_text, _) = job.resolve(&db, &owner)?;
                    let analysis = client.analyze_job_description(&job_text)?;

                    println!("Level:     {}", analysis.experience_level);
                    println!("Work type: {}", analysis.work_type);
                    if let Some(salary) = &analysis.salary_range {
                        println!("Salary:    {}", salary);
                    }
                    println!();
                    print_list("Required skills", &analysis.required_skills);
                    print_list("Preferred skills", &analysis.preferred_skills);
                    print_list("Responsibilities", &analysis.responsibilities);
                    print_list("Qualifications", &analysis.qualifications);
                    println!("{}", textwrap::fill(&analysis.summary, 80));
                }

                AiCommands::Research { company, context } => {
                    let research = client.research_company(&company, context.as_deref())?;

                    println!("{} ({}, {})\n", company, research.industry, research.size);
                    println!("{}\n", textwrap::fill(&research.overview, 80));
                    print_list("Culture", &research.culture);
                    print_list("Key facts", &research.key_facts);
                    print_list("Interview tips", &research.interview_tips);
                }
            }
        }
    }

    Ok(())
}

impl AddArgs {
    fn into_new_application(self) -> Result<NewApplication> {
        let job_description = self
            .description_file
            .as_deref()
            .map(|path| read_text(path, "job description"))
            .transpose()?;

        let mut new = NewApplication::new(self.title, self.company);
        new.location = self.location;
        new.is_remote = self.remote;
        new.job_url = self.url;
        new.job_description = job_description;
        new.salary = SalaryRange {
            min: self.salary_min,
            max: self.salary_max,
            currency: self.currency,
        };
        new.status = self.status;
        new.source = self.source;
        new.priority = self.priority;
        new.cv_id = self.cv;
        new.notes = self.notes;
        new.tags = self.tag;
        new.applied_date = self.applied.as_deref().map(parse_when).transpose()?;
        if new.applied_date.is_none() && new.status.in_funnel() {
            new.applied_date = Some(Utc::now());
        }
        Ok(new)
    }
}

impl JobInput {
    fn resolve(&self, db: &Database, owner: &str) -> Result<(String, Option<Application>)> {
        match (&self.job_file, &self.application) {
            (Some(path), _) => Ok((read_text(path, "job description")?, None)),
            (None, Some(id)) => {
                let app = find_application(db, owner, id)?;
                let text = app
                    .job_description
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .ok_or_else(|| anyhow!("Application {} has no job description", short_id(&app.id)))?;
                Ok((text, Some(app)))
            }
            (None, None) => bail!("Pass --job-file or --application"),
        }
    }
}

fn ai_client(config: &Config, model: Option<&str>) -> Result<AiClient> {
    AiClient::from_model(
        model.unwrap_or(&config.ai_model),
        Duration::from_secs(config.ai_cache_ttl_secs),
    )
}

/// Full ID or a unique prefix of one of the owner's applications.
fn find_application(db: &Database, owner: &str, id: &str) -> Result<Application> {
    let mut matches: Vec<Application> = load_applications(db, owner)?
        .into_iter()
        .filter(|a| a.id.starts_with(id))
        .collect();
    match matches.len() {
        0 => Err(anyhow!("Application '{}' not found", id)),
        1 => Ok(matches.remove(0)),
        n => match matches.iter().position(|a| a.id == id) {
            Some(exact) => Ok(matches.remove(exact)),
            None => Err(anyhow!("'{}' matches {} applications; use a longer prefix", id, n)),
        },
    }
}

fn print_application(app: &Application) {
    println!("Application {}", app.id);
    println!("Title:    {}", app.job_title);
    println!("Company:  {}", app.company);
    println!("Status:   {}", app.status.label());
    println!("Priority: {}", app.priority);
    println!("Source:   {}", app.source.as_str());
    if !app.location.is_empty() || app.is_remote {
        let remote = if app.is_remote { " (remote)" } else { "" };
        println!("Location: {}{}", app.location, remote);
    }
    if !app.salary.is_empty() {
        println!("Salary:   {}", app.salary);
    }
    if let Some(url) = &app.job_url {
        println!("URL:      {}", url);
    }
    if let Some(cv) = &app.cv_id {
        println!("CV:       {}", short_id(cv));
    }
    if !app.tags.is_empty() {
        println!("Tags:     {}", app.tags.join(", "));
    }

    let dates = [
        ("Applied", app.applied_date),
        ("Response", app.response_date),
        ("Interview", app.interview_date),
        ("Offer", app.offer_date),
        ("Followed up", app.last_follow_up_date),
        ("Follow up", app.next_follow_up_date),
    ];
    for (label, date) in dates {
        if let Some(date) = date {
            println!("{:<12} {}", format!("{}:", label), date.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
        }
    }

    if let Some(notes) = &app.notes {
        println!("\n--- Notes ---\n{}", textwrap::fill(notes, 80));
    }
    if let Some(description) = &app.job_description {
        println!("\n--- Description ---\n{}", textwrap::fill(description, 80));
    }

    println!("\n--- Timeline ---");
    for event in &app.timeline {
        println!(
            "{}  {:<20} {}",
            event.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            event.event_type.as_str(),
            event.description
        );
    }
}

fn print_list(heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{}:", heading);
    for item in items {
        println!("  - {}", item);
    }
    println!();
}

/// "2025-03-01" (local midnight), "2025-03-01 14:30" (local) or RFC 3339.
fn parse_when(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDate::parse_from_str(input, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN)))
        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD or YYYY-MM-DD HH:MM", input))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("'{}' does not exist in the local timezone", input))
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {} file: {}", what, path.display()))
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_size(bytes: u64) -> String {
    match bytes {
        0..1024 => format!("{} B", bytes),
        1024..1_048_576 => format!("{:.1} KB", bytes as f64 / 1024.0),
        _ => format!("{:.1} MB", bytes as f64 / 1_048_576.0),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
