use anyhow::{anyhow, Context, Result};
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::ai::{company_from_sender, AiClient, EmailContent};
use crate::db::Database;
use crate::models::{ApplicationStatus, JobSource, NewApplication, SalaryRange};

pub struct EmailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl EmailConfig {
    pub fn new(server: &str, port: u16, username: &str, app_password: &str) -> Self {
        Self {
            server: server.to_string(),
            port,
            username: username.to_string(),
            password: app_password.trim().to_string(),
        }
    }

    pub fn gmail(username: &str, app_password: &str) -> Self {
        Self::new("imap.gmail.com", 993, username, app_password)
    }

    pub fn with_password_file(server: &str, port: u16, username: &str, password_file: &Path) -> Result<Self> {
        let password = fs::read_to_string(password_file)
            .with_context(|| format!("Failed to read password file: {:?}", password_file))?;
        Ok(Self::new(server, port, username, &password))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestStats {
    pub emails_found: usize,
    pub jobs_found: usize,
    pub jobs_added: usize,
    pub duplicates: usize,
    pub errors: usize,
}

/// Pulls job leads out of an IMAP inbox and records them as saved
/// applications. With an [`AiClient`] each email is read by the model
/// instead of the HTML heuristics.
pub struct EmailIngester<'a> {
    config: EmailConfig,
    ai: Option<&'a AiClient>,
}

impl<'a> EmailIngester<'a> {
    pub fn new(config: EmailConfig) -> Self {
        Self { config, ai: None }
    }

    pub fn with_ai(mut self, ai: &'a AiClient) -> Self {
        self.ai = Some(ai);
        self
    }

    pub fn fetch_job_alerts(&self, db: &Database, owner_id: &str, days: u32, dry_run: bool) -> Result<IngestStats> {
        let tls = native_tls::TlsConnector::builder().build()?;

        let addr = (self.config.server.as_str(), self.config.port);
        let tcp = std::net::TcpStream::connect(addr).context("Failed to connect to IMAP server")?;
        tcp.set_read_timeout(Some(std::time::Duration::from_secs(30)))?;
        tcp.set_write_timeout(Some(std::time::Duration::from_secs(30)))?;
        let tls_stream = tls.connect(&self.config.server, tcp)?;

        let client = imap::Client::new(tls_stream);
        let mut session = client
            .login(&self.config.username, &self.config.password)
            .map_err(|e| anyhow!("Login failed: {}", e.0))?;
        info!(server = %self.config.server, user = %self.config.username, "connected to IMAP server");

        session.select("INBOX")?;

        let since = (chrono::Utc::now() - chrono::Duration::days(days as i64))
            .format("%d-%b-%Y")
            .to_string();
        let search_queries = [
            ("LinkedIn alerts", format!("FROM \"jobs-noreply@linkedin.com\" SINCE {}", since)),
            ("LinkedIn jobs", format!("FROM \"linkedin.com\" SUBJECT \"job\" SINCE {}", since)),
            ("Indeed", format!("FROM \"indeed.com\" SINCE {}", since)),
            ("Job subjects", format!("SUBJECT \"job\" SINCE {}", since)),
        ];

        let mut stats = IngestStats::default();
        let mut seen: HashSet<u32> = HashSet::new();

        for (label, query) in &search_queries {
            let message_ids = match session.search(query) {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(search = label, error = %e, "IMAP search failed");
                    continue;
                }
            };

            let mut new_ids: Vec<u32> = message_ids.into_iter().filter(|id| seen.insert(*id)).collect();
            new_ids.sort_unstable();
            info!(search = label, emails = new_ids.len(), "matched emails");

            for id in new_ids {
                stats.emails_found += 1;
                let messages = session.fetch(id.to_string(), "RFC822")?;
                for message in messages.iter() {
                    if let Some(body) = message.body() {
                        if let Err(e) = self.process_email(body, db, owner_id, dry_run, &mut stats) {
                            stats.errors += 1;
                            warn!(uid = id, error = %e, "failed to process email");
                        }
                    }
                }
            }
        }

        session.logout()?;
        Ok(stats)
    }

    fn process_email(
        &self,
        raw: &[u8],
        db: &Database,
        owner_id: &str,
        dry_run: bool,
        stats: &mut IngestStats,
    ) -> Result<()> {
        let parsed = parse_mail(raw)?;
        let from = parsed.headers.get_first_value("From").unwrap_or_default();
        let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
        let date = parsed.headers.get_first_value("Date").unwrap_or_default();
        let body = get_email_body(&parsed)?;

        let jobs: Vec<ParsedJob> = match self.ai {
            Some(ai) => {
                let email = EmailContent { subject: &subject, from: &from, date: &date, body: &body };
                ai.extract_email_offer(&email)?
                    .map(|offer| ParsedJob {
                        title: offer.job_title,
                        company: Some(offer.company),
                        url: offer.job_url,
                        salary: offer.salary.as_deref().map(extract_salary).unwrap_or_default(),
                        location: offer.location,
                        description: Some(offer.job_description).filter(|d| !d.trim().is_empty()),
                        origin: "email".to_string(),
                    })
                    .into_iter()
                    .collect()
            }
            None => parse_email_jobs(&from, &subject, &body),
        };
        debug!(subject = %subject, jobs = jobs.len(), "parsed email");

        for job in jobs {
            stats.jobs_found += 1;
            let new = job.into_new_application(&from);

            if db
                .find_duplicate(owner_id, &new.job_title, &new.company, new.job_url.as_deref())?
                .is_some()
            {
                stats.duplicates += 1;
                debug!(title = %new.job_title, company = %new.company, "skipping duplicate");
                continue;
            }

            if dry_run {
                println!("[DRY RUN] Would add: {} at {}", new.job_title, new.company);
                continue;
            }

            let app = db.create_application(owner_id, new)?;
            info!(id = %app.id, title = %app.job_title, company = %app.company, "imported application from email");
            stats.jobs_added += 1;
        }

        Ok(())
    }
}

fn find_part(parsed: &ParsedMail, mime: &str) -> Option<String> {
    if parsed.subparts.is_empty() {
        return (parsed.ctype.mimetype == mime)
            .then(|| parsed.get_body().ok())
            .flatten();
    }
    parsed.subparts.iter().find_map(|part| find_part(part, mime))
}

fn get_email_body(parsed: &ParsedMail) -> Result<String> {
    if parsed.subparts.is_empty() {
        return Ok(parsed.get_body()?);
    }

    // Prefer HTML, it carries the job links
    if let Some(html) = find_part(parsed, "text/html") {
        return Ok(html);
    }
    if let Some(text) = find_part(parsed, "text/plain") {
        return Ok(text);
    }
    match parsed.subparts.first() {
        Some(part) => Ok(part.get_body()?),
        None => Err(anyhow!("No email body found")),
    }
}

/// A job lead scraped from one email.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedJob {
    pub title: String,
    pub company: Option<String>,
    pub url: Option<String>,
    pub location: Option<String>,
    pub salary: SalaryRange,
    pub description: Option<String>,
    /// Which parser produced it: `linkedin`, `indeed` or `email`.
    pub origin: String,
}

impl ParsedJob {
    fn from_link(text: &str, href: &str, origin: &str) -> Option<Self> {
        let (title, company, location) = match parse_linkedin_title_company_location(text) {
            Some(parts) => parts,
            None => {
                let (title, company) = parse_title_at_company(text);
                (title, company, None)
            }
        };
        if title.is_empty() {
            return None;
        }
        Some(Self {
            title,
            company,
            url: clean_tracking_url(href),
            location,
            salary: extract_salary(text),
            description: None,
            origin: origin.to_string(),
        })
    }

    /// Every email lead starts life as a saved application from `email`.
    pub fn into_new_application(self, sender: &str) -> NewApplication {
        let company = self
            .company
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| company_from_sender(sender));
        let location = self.location.unwrap_or_default();

        let mut new = NewApplication::new(self.title, company);
        new.is_remote = location.to_lowercase().contains("remote");
        new.location = location;
        new.job_url = self.url;
        new.job_description = self.description;
        new.salary = self.salary;
        new.status = ApplicationStatus::Saved;
        new.source = JobSource::Email;
        if self.origin != "email" {
            new.tags = vec![self.origin];
        }
        new
    }
}

/// Picks the parser by sender.
pub fn parse_email_jobs(from: &str, subject: &str, body: &str) -> Vec<ParsedJob> {
    let from = from.to_lowercase();
    let mut jobs = if from.contains("linkedin.com") {
        parse_linkedin_email(body)
    } else if from.contains("indeed.com") {
        parse_indeed_email(body)
    } else {
        parse_generic_job_email(subject, body)
    };

    let mut seen = HashSet::new();
    jobs.retain(|job| {
        let key = (
            job.title.to_lowercase(),
            job.company.as_deref().unwrap_or("").to_lowercase(),
        );
        seen.insert(key)
    });
    jobs
}

fn is_navigation_artifact(text: &str) -> bool {
    let text_lower = text.to_lowercase();
    let text_trimmed = text.trim();

    if text_trimmed.len() < 10 {
        return true;
    }

    let artifacts = ["search for jobs", "see all jobs", "view all", "search other jobs", "jobs"];
    if artifacts.contains(&text_lower.trim()) {
        return true;
    }

    if text_lower.starts_with("jobs similar to")
        || text_lower.starts_with("jobs in ")
        || text_lower.starts_with("manage job")
        || text_lower.contains("unsubscribe")
        || text_lower.contains("privacy")
    {
        return true;
    }

    // "Engineering Manager jobs" links to search results
    text_trimmed.ends_with(" jobs") || text_trimmed.ends_with(" Jobs")
}

pub fn is_search_link(url: &str) -> bool {
    url.contains("/jobs/search") || url.contains("/search?") || url.contains("/jobs/alerts")
}

fn link_jobs(body: &str, selector: &str, origin: &str, accept: impl Fn(&str) -> bool) -> Vec<ParsedJob> {
    let document = Html::parse_document(body);
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href").unwrap_or("");
            let text = element.text().collect::<Vec<_>>().join(" ");
            let text = text.trim();
            if text.is_empty() || is_navigation_artifact(text) || is_search_link(href) || !accept(href) {
                return None;
            }
            ParsedJob::from_link(text, href, origin)
        })
        .collect()
}

fn parse_linkedin_email(body: &str) -> Vec<ParsedJob> {
    let jobs = link_jobs(body, "a[href*='linkedin.com/comm/jobs']", "linkedin", |_| true);
    if !jobs.is_empty() {
        return jobs;
    }
    let document = Html::parse_document(body);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    extract_jobs_from_text(&text, "linkedin")
}

fn parse_indeed_email(body: &str) -> Vec<ParsedJob> {
    link_jobs(body, "a[href*='indeed.com']", "indeed", |href| {
        href.contains("/viewjob") || href.contains("/rc/clk") || href.contains("jk=")
    })
}

fn parse_generic_job_email(subject: &str, body: &str) -> Vec<ParsedJob> {
    let document = Html::parse_document(body);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");
    let mut jobs = extract_jobs_from_text(&format!("{} {}", subject, text), "email");

    // Only keep a link when the email offers exactly one role
    if jobs.len() == 1 {
        if let Ok(selector) = Selector::parse("a[href^='http']") {
            jobs[0].url = document
                .select(&selector)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| !is_search_link(href) && !href.contains("unsubscribe"))
                .and_then(clean_tracking_url);
        }
    }
    jobs
}

fn extract_jobs_from_text(text: &str, origin: &str) -> Vec<ParsedJob> {
    let Ok(re) = Regex::new(
        r"(?i)\b(senior|staff|principal|lead|junior|sr\.?|jr\.?)?\s*(software|devops|platform|infrastructure|site reliability|sre|cloud|backend|frontend|full[- ]?stack|data|ml|machine learning|product|mobile|qa)\s+(engineer|developer|architect|manager|lead|specialist|designer|scientist)\b",
    ) else {
        return Vec::new();
    };

    let salary = extract_salary(text);
    let excerpt: String = text.split_whitespace().collect::<Vec<_>>().join(" ").chars().take(500).collect();

    re.find_iter(text)
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|title| title.len() > 5)
        .map(|title| ParsedJob {
            title,
            company: None,
            url: None,
            location: None,
            salary: salary.clone(),
            description: Some(excerpt.clone()),
            origin: origin.to_string(),
        })
        .fold(Vec::<ParsedJob>::new(), |mut acc, job| {
            if !acc.iter().any(|j| j.title.eq_ignore_ascii_case(&job.title)) {
                acc.push(job);
            }
            acc
        })
}

/// LinkedIn alert cards: "Title<2+ spaces>Company · Location".
fn parse_linkedin_title_company_location(text: &str) -> Option<(String, Option<String>, Option<String>)> {
    let text = text.trim();
    let (before, location) = text.split_once('·')?;
    let before = before.trim();
    let location = location.trim().to_string();

    let re = Regex::new(r"\s{2,}").ok()?;
    let gap = re.find_iter(before).last()?;
    let title = before[..gap.start()].trim().to_string();
    let company = before[gap.end()..].trim().to_string();

    if title.is_empty() || company.is_empty() {
        return None;
    }
    let location = (!location.is_empty()).then_some(location);
    Some((title, Some(company), location))
}

fn parse_title_at_company(text: &str) -> (String, Option<String>) {
    // "Software Engineer at Google", "Software Engineer - Google", "Software Engineer, Google"
    let text = text.trim();

    if let Some((title, company, _)) = parse_linkedin_title_company_location(text) {
        return (title, company);
    }

    // Matched on the original text so byte offsets stay on char boundaries
    if let Some(sep) = Regex::new(r"(?i)\s+at\s+").ok().and_then(|re| re.find(text)) {
        let employer = text[sep.end()..].trim();
        if !employer.is_empty() {
            return (text[..sep.start()].trim().to_string(), Some(employer.to_string()));
        }
    }

    if let Some(idx) = text.rfind(" - ") {
        let employer = text[idx + 3..].trim();
        let lower = employer.to_lowercase();
        if !employer.is_empty() && !lower.contains("engineer") && !lower.contains("developer") {
            return (text[..idx].trim().to_string(), Some(employer.to_string()));
        }
    }

    if let Some(idx) = text.rfind(", ") {
        let employer = text[idx + 2..].trim();
        if !employer.is_empty() && employer.len() < 50 && !employer.contains("Remote") && !employer.contains("Hybrid") {
            return (text[..idx].trim().to_string(), Some(employer.to_string()));
        }
    }

    (text.to_string(), None)
}

/// Drops tracking query strings and fragments.
fn clean_tracking_url(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    let end = url.find(['?', '#']).unwrap_or(url.len());
    Some(url[..end].to_string())
}

/// First two amounts like "$150k - $200,000" become min and max.
pub fn extract_salary(text: &str) -> SalaryRange {
    let mut salary = SalaryRange::default();
    let Ok(re) = Regex::new(r"([$€£])\s?(\d{1,3}(?:,\d{3})+|\d+(?:\.\d+)?)\s*([kK])?") else {
        return salary;
    };

    let mut amounts = Vec::new();
    for cap in re.captures_iter(text).take(2) {
        let Ok(number) = cap[2].replace(',', "").parse::<f64>() else {
            continue;
        };
        // Bare "$150" in a pay line means thousands
        let value = if cap.get(3).is_some() || number < 1000.0 { number * 1000.0 } else { number };
        if amounts.is_empty() {
            salary.currency = match &cap[1] {
                "€" => "EUR",
                "£" => "GBP",
                _ => "USD",
            }
            .to_string();
        }
        amounts.push(value.round() as i64);
    }

    match amounts.as_slice() {
        [only] => salary.min = Some(*only),
        [a, b] => {
            salary.min = Some(*a.min(b));
            salary.max = Some(*a.max(b));
        }
        _ => {}
    }
    salary
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINKEDIN_ALERT: &str = "From: LinkedIn Job Alerts <jobs-noreply@linkedin.com>\r\n\
Subject: Senior Platform Engineer and more\r\n\
Date: Mon, 6 Jan 2025 09:00:00 +0000\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body>\
<a href=\"https://www.linkedin.com/comm/jobs/view/123?trk=abc\">Senior Platform Engineer             Sully.ai \u{b7} Mountain View, CA (Remote)</a>\
<a href=\"https://www.linkedin.com/comm/jobs/search?keywords=platform\">See all jobs</a>\
</body></html>\r\n";

    #[test]
    fn test_parse_linkedin_title_company_location() {
        let (title, company, location) =
            parse_linkedin_title_company_location("Staff DevOps Engineer, DevInfra             SandboxAQ · United States (Remote)")
                .unwrap();
        assert_eq!(title, "Staff DevOps Engineer, DevInfra");
        assert_eq!(company.as_deref(), Some("SandboxAQ"));
        assert_eq!(location.as_deref(), Some("United States (Remote)"));

        let (title, company, _) =
            parse_linkedin_title_company_location("Staff Engineer - Platform             Grow Therapy · New York, NY (Remote)")
                .unwrap();
        assert_eq!(title, "Staff Engineer - Platform");
        assert_eq!(company.as_deref(), Some("Grow Therapy"));
    }

    #[test]
    fn test_parse_linkedin_title_company_location_needs_middot_and_gap() {
        assert!(parse_linkedin_title_company_location("Senior Engineer at Google").is_none());
        assert!(parse_linkedin_title_company_location("Senior Engineer Company · Location").is_none());
    }

    #[test]
    fn test_parse_title_at_company_fallback_patterns() {
        assert_eq!(
            parse_title_at_company("Software Engineer at Google"),
            ("Software Engineer".to_string(), Some("Google".to_string()))
        );
        assert_eq!(
            parse_title_at_company("DevOps Lead - Amazon"),
            ("DevOps Lead".to_string(), Some("Amazon".to_string()))
        );
        assert_eq!(
            parse_title_at_company("Backend Developer, Remote"),
            ("Backend Developer, Remote".to_string(), None)
        );
    }

    #[test]
    fn test_parse_title_at_company_handles_non_ascii_case_folding() {
        assert_eq!(
            parse_title_at_company("İ at é"),
            ("İ".to_string(), Some("é".to_string()))
        );
        assert_eq!(
            parse_title_at_company("İngénieur AT Société Générale"),
            ("İngénieur".to_string(), Some("Société Générale".to_string()))
        );
    }

    #[test]
    fn test_is_navigation_artifact() {
        assert!(is_navigation_artifact("Jobs"));
        assert!(is_navigation_artifact("SEARCH FOR JOBS"));
        assert!(is_navigation_artifact("Jobs in Seattle, WA"));
        assert!(is_navigation_artifact("Unsubscribe from alerts"));
        assert!(is_navigation_artifact("Engineering Manager jobs"));
        assert!(is_navigation_artifact("123456789"));
        assert!(!is_navigation_artifact("1234567890"));
        assert!(!is_navigation_artifact("Senior Software Engineer at Google"));
        assert!(!is_navigation_artifact("Jobs Program Manager at Google"));
    }

    #[test]
    fn test_is_search_link() {
        assert!(is_search_link("https://www.linkedin.com/comm/jobs/search?keywords=Engineering+Manager"));
        assert!(is_search_link("https://www.linkedin.com/comm/jobs/alerts"));
        assert!(!is_search_link("https://www.linkedin.com/comm/jobs/view/123456"));
        assert!(!is_search_link("https://www.indeed.com/viewjob?jk=abc123"));
    }

    #[test]
    fn test_clean_tracking_url() {
        assert_eq!(
            clean_tracking_url("https://www.linkedin.com/jobs/view/123456?refId=abcd&trackingId=xyz").as_deref(),
            Some("https://www.linkedin.com/jobs/view/123456")
        );
        assert_eq!(
            clean_tracking_url("https://example.com/job#section").as_deref(),
            Some("https://example.com/job")
        );
        assert_eq!(clean_tracking_url(""), None);
    }

    #[test]
    fn test_extract_salary() {
        let range = extract_salary("Pay: $150k - $200k per year");
        assert_eq!((range.min, range.max), (Some(150_000), Some(200_000)));
        assert_eq!(range.currency, "USD");

        let swapped = extract_salary("$120,000 to $95,000");
        assert_eq!((swapped.min, swapped.max), (Some(95_000), Some(120_000)));

        let euro = extract_salary("from €60k");
        assert_eq!((euro.min, euro.max), (Some(60_000), None));
        assert_eq!(euro.currency, "EUR");

        assert!(extract_salary("competitive pay").is_empty());
    }

    #[test]
    fn test_parse_indeed_email_keeps_job_links_only() {
        let body = r#"<html><body>
            <a href="https://www.indeed.com/viewjob?jk=abc&from=email">Backend Engineer at Globex</a>
            <a href="https://www.indeed.com/jobs?q=engineer">Search other jobs</a>
            <a href="https://www.indeed.com/account">Account settings page</a>
        </body></html>"#;
        let jobs = parse_email_jobs("Indeed <alert@indeed.com>", "New jobs", body);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Backend Engineer");
        assert_eq!(jobs[0].company.as_deref(), Some("Globex"));
        assert_eq!(jobs[0].url.as_deref(), Some("https://www.indeed.com/viewjob"));
        assert_eq!(jobs[0].origin, "indeed");
    }

    #[test]
    fn test_parse_generic_email_finds_titles() {
        let body = "<p>We think you'd be a great Senior Backend Engineer here. Pay $140k-$170k.</p>\
                    <a href=\"https://careers.acme.io/jobs/42?utm=mail\">Apply</a>";
        let jobs = parse_email_jobs("Acme Talent <talent@acme.io>", "Opportunity", body);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Senior Backend Engineer");
        assert_eq!(jobs[0].url.as_deref(), Some("https://careers.acme.io/jobs/42"));
        assert_eq!(jobs[0].salary.min, Some(140_000));
        assert_eq!(jobs[0].salary.max, Some(170_000));
    }

    #[test]
    fn test_into_new_application_is_saved_from_email() {
        let job = ParsedJob {
            title: "Data Engineer".to_string(),
            company: None,
            url: None,
            location: Some("Remote, EU".to_string()),
            salary: SalaryRange::default(),
            description: None,
            origin: "linkedin".to_string(),
        };
        let new = job.into_new_application("Initech Careers <jobs@initech.com>");
        assert_eq!(new.company, "Initech Careers");
        assert_eq!(new.status, ApplicationStatus::Saved);
        assert_eq!(new.source, JobSource::Email);
        assert!(new.is_remote);
        assert_eq!(new.tags, vec!["linkedin"]);
    }

    #[test]
    fn test_process_email_imports_once() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        let ingester = EmailIngester::new(EmailConfig::gmail("me@example.com", "app-password"));

        let mut stats = IngestStats::default();
        ingester
            .process_email(LINKEDIN_ALERT.as_bytes(), &db, "owner", false, &mut stats)
            .unwrap();
        assert_eq!(stats.jobs_added, 1);

        let apps = crate::store::load_applications(&db, "owner").unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].job_title, "Senior Platform Engineer");
        assert_eq!(apps[0].company, "Sully.ai");
        assert_eq!(apps[0].job_url.as_deref(), Some("https://www.linkedin.com/comm/jobs/view/123"));
        assert_eq!(apps[0].status, ApplicationStatus::Saved);
        assert_eq!(apps[0].source, JobSource::Email);
        assert!(apps[0].is_remote);

        ingester
            .process_email(LINKEDIN_ALERT.as_bytes(), &db, "owner", false, &mut stats)
            .unwrap();
        assert_eq!(stats.jobs_added, 1);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_process_email_dry_run_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        let ingester = EmailIngester::new(EmailConfig::gmail("me@example.com", "app-password"));

        let mut stats = IngestStats::default();
        ingester
            .process_email(LINKEDIN_ALERT.as_bytes(), &db, "owner", true, &mut stats)
            .unwrap();
        assert_eq!(stats.jobs_found, 1);
        assert_eq!(stats.jobs_added, 0);
        assert!(crate::store::load_applications(&db, "owner").unwrap().is_empty());
    }
}
