use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

// --- Enumerations ---

/// Pipeline column an application sits in. Any status may move to any other.
///
/// `Unrecognized` holds stored values that match no known status; it is never
/// a board column and never a move target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplicationStatus {
    Saved,
    Applied,
    PhoneScreen,
    Interview,
    Technical,
    Offer,
    Rejected,
    Withdrawn,
    Archived,
    Unrecognized,
}

impl ApplicationStatus {
    /// Every real status, in board column order.
    pub const ALL: [ApplicationStatus; 9] = [
        ApplicationStatus::Saved,
        ApplicationStatus::Applied,
        ApplicationStatus::PhoneScreen,
        ApplicationStatus::Interview,
        ApplicationStatus::Technical,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
        ApplicationStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Saved => "saved",
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::PhoneScreen => "phone_screen",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Technical => "technical",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
            ApplicationStatus::Archived => "archived",
            ApplicationStatus::Unrecognized => "unrecognized",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ApplicationStatus::Saved => "Saved",
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::PhoneScreen => "Phone Screen",
            ApplicationStatus::Interview => "Interview",
            ApplicationStatus::Technical => "Technical",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Withdrawn => "Withdrawn",
            ApplicationStatus::Archived => "Archived",
            ApplicationStatus::Unrecognized => "Unrecognized",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Offer
                | ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
                | ApplicationStatus::Archived
        )
    }

    /// Reached at least the "applied" stage (the conversion funnel superset).
    pub fn in_funnel(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Applied
                | ApplicationStatus::PhoneScreen
                | ApplicationStatus::Interview
                | ApplicationStatus::Technical
                | ApplicationStatus::Offer
        )
    }

    pub fn reached_interview(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Interview | ApplicationStatus::Technical | ApplicationStatus::Offer
        )
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "saved" => Ok(ApplicationStatus::Saved),
            "applied" => Ok(ApplicationStatus::Applied),
            "phone_screen" => Ok(ApplicationStatus::PhoneScreen),
            "interview" => Ok(ApplicationStatus::Interview),
            "technical" => Ok(ApplicationStatus::Technical),
            "offer" => Ok(ApplicationStatus::Offer),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "withdrawn" => Ok(ApplicationStatus::Withdrawn),
            "archived" => Ok(ApplicationStatus::Archived),
            _ => Err(format!(
                "Invalid status '{}'. Expected one of: saved, applied, phone_screen, interview, \
                 technical, offer, rejected, withdrawn, archived",
                s
            )),
        }
    }
}

impl From<String> for ApplicationStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(ApplicationStatus::Unrecognized)
    }
}

impl From<ApplicationStatus> for String {
    fn from(status: ApplicationStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a lead was found. Only analytics looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobSource {
    Linkedin,
    Indeed,
    Glassdoor,
    CompanyWebsite,
    Referral,
    Recruiter,
    Email,
    Other,
    Unrecognized,
}

impl JobSource {
    pub const ALL: [JobSource; 8] = [
        JobSource::Linkedin,
        JobSource::Indeed,
        JobSource::Glassdoor,
        JobSource::CompanyWebsite,
        JobSource::Referral,
        JobSource::Recruiter,
        JobSource::Email,
        JobSource::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobSource::Linkedin => "linkedin",
            JobSource::Indeed => "indeed",
            JobSource::Glassdoor => "glassdoor",
            JobSource::CompanyWebsite => "company_website",
            JobSource::Referral => "referral",
            JobSource::Recruiter => "recruiter",
            JobSource::Email => "email",
            JobSource::Other => "other",
            JobSource::Unrecognized => "unrecognized",
        }
    }
}

impl FromStr for JobSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "linkedin" => Ok(JobSource::Linkedin),
            "indeed" => Ok(JobSource::Indeed),
            "glassdoor" => Ok(JobSource::Glassdoor),
            "company_website" | "website" => Ok(JobSource::CompanyWebsite),
            "referral" => Ok(JobSource::Referral),
            "recruiter" => Ok(JobSource::Recruiter),
            "email" => Ok(JobSource::Email),
            "other" => Ok(JobSource::Other),
            _ => Err(format!(
                "Invalid source '{}'. Expected one of: linkedin, indeed, glassdoor, \
                 company_website, referral, recruiter, email, other",
                s
            )),
        }
    }
}

impl From<String> for JobSource {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(JobSource::Unrecognized)
    }
}

impl From<JobSource> for String {
    fn from(source: JobSource) -> Self {
        source.as_str().to_string()
    }
}

impl fmt::Display for JobSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!("Invalid priority '{}'. Expected low, medium or high", s)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatusChange,
    EmailReceived,
    EmailSent,
    NoteAdded,
    InterviewScheduled,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StatusChange => "status_change",
            EventType::EmailReceived => "email_received",
            EventType::EmailSent => "email_sent",
            EventType::NoteAdded => "note_added",
            EventType::InterviewScheduled => "interview_scheduled",
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "status_change" => Ok(EventType::StatusChange),
            "email_received" => Ok(EventType::EmailReceived),
            "email_sent" => Ok(EventType::EmailSent),
            "note_added" | "note" => Ok(EventType::NoteAdded),
            "interview_scheduled" | "interview" => Ok(EventType::InterviewScheduled),
            _ => Err(format!("Invalid event type '{}'", s)),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// --- Records ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TimelineEvent {
    pub fn new(event_type: EventType, description: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            description: description.into(),
            timestamp,
            metadata: None,
        }
    }

    /// An event entered by hand. `status_change` events only come from status
    /// moves, which also update the status itself.
    pub fn manual(
        event_type: EventType,
        description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        if event_type == EventType::StatusChange {
            return Err(StoreError::Invalid(
                "status_change events are recorded by moving the application".to_string(),
            ));
        }
        Ok(Self::new(event_type, description, timestamp))
    }

    pub fn status_change(to: ApplicationStatus, note: Option<&str>, timestamp: DateTime<Utc>) -> Self {
        let description = match note {
            Some(note) if !note.trim().is_empty() => note.to_string(),
            _ => format!("Status changed to: {}", to),
        };
        let mut event = Self::new(EventType::StatusChange, description, timestamp);
        event.metadata = Some(serde_json::json!({ "status": to.as_str() }));
        event
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub currency: String,
}

impl SalaryRange {
    pub fn validate(&self) -> Result<(), StoreError> {
        match (self.min, self.max) {
            (Some(min), Some(max)) if min > max => Err(StoreError::Invalid(format!(
                "salary min {} exceeds max {}",
                min, max
            ))),
            _ => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

impl Default for SalaryRange {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
            currency: "USD".to_string(),
        }
    }
}

impl fmt::Display for SalaryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(min), Some(max)) => write!(f, "{} - {} {}", min, max, self.currency),
            (Some(min), None) => write!(f, "{}+ {}", min, self.currency),
            (None, Some(max)) => write!(f, "up to {} {}", max, self.currency),
            (None, None) => write!(f, "-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub owner_id: String,

    pub job_title: String,
    pub company: String,
    pub location: String,
    pub is_remote: bool,
    pub job_url: Option<String>,
    pub job_description: Option<String>,
    pub salary: SalaryRange,

    pub status: ApplicationStatus,
    pub source: JobSource,
    pub priority: Priority,
    pub cv_id: Option<String>,
    pub cover_letter: Option<String>,
    pub recruiter_name: Option<String>,
    pub recruiter_email: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub match_score: Option<f64>,

    pub applied_date: Option<DateTime<Utc>>,
    pub response_date: Option<DateTime<Utc>>,
    pub interview_date: Option<DateTime<Utc>>,
    pub offer_date: Option<DateTime<Utc>>,
    pub last_follow_up_date: Option<DateTime<Utc>>,
    pub next_follow_up_date: Option<DateTime<Utc>>,

    pub timeline: Vec<TimelineEvent>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Builds a fresh record with a single creation event on its timeline.
    pub fn create(owner_id: &str, new: NewApplication, now: DateTime<Utc>) -> Result<Self, StoreError> {
        new.validate()?;

        let created = TimelineEvent::new(
            EventType::StatusChange,
            format!("Application created with status: {}", new.status),
            now,
        );

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            job_title: new.job_title.trim().to_string(),
            company: new.company.trim().to_string(),
            location: new.location,
            is_remote: new.is_remote,
            job_url: new.job_url,
            job_description: new.job_description,
            salary: new.salary,
            status: new.status,
            source: new.source,
            priority: new.priority,
            cv_id: new.cv_id,
            cover_letter: None,
            recruiter_name: None,
            recruiter_email: None,
            notes: new.notes,
            tags: new.tags,
            match_score: None,
            applied_date: new.applied_date,
            response_date: None,
            interview_date: None,
            offer_date: None,
            last_follow_up_date: None,
            next_follow_up_date: None,
            timeline: vec![created],
            created_at: now,
            updated_at: now,
        })
    }
}

/// Form data for a new application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewApplication {
    pub job_title: String,
    pub company: String,
    pub location: String,
    pub is_remote: bool,
    pub job_url: Option<String>,
    pub job_description: Option<String>,
    pub salary: SalaryRange,
    pub status: ApplicationStatus,
    pub source: JobSource,
    pub priority: Priority,
    pub cv_id: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub applied_date: Option<DateTime<Utc>>,
}

impl NewApplication {
    pub fn new(job_title: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            job_title: job_title.into(),
            company: company.into(),
            location: String::new(),
            is_remote: false,
            job_url: None,
            job_description: None,
            salary: SalaryRange::default(),
            status: ApplicationStatus::Saved,
            source: JobSource::Other,
            priority: Priority::default(),
            cv_id: None,
            notes: None,
            tags: Vec::new(),
            applied_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.job_title.trim().is_empty() {
            return Err(StoreError::Invalid("job title is required".to_string()));
        }
        if self.company.trim().is_empty() {
            return Err(StoreError::Invalid("company is required".to_string()));
        }
        if self.status == ApplicationStatus::Unrecognized {
            return Err(StoreError::Invalid("status is not recognized".to_string()));
        }
        self.salary.validate()
    }
}

/// Partial update. Unset fields are left alone; events are appended in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationPatch {
    pub status: Option<ApplicationStatus>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    pub applied_date: Option<DateTime<Utc>>,
    pub response_date: Option<DateTime<Utc>>,
    pub interview_date: Option<DateTime<Utc>>,
    pub offer_date: Option<DateTime<Utc>>,
    pub last_follow_up_date: Option<DateTime<Utc>>,
    pub next_follow_up_date: Option<DateTime<Utc>>,
    pub append_events: Vec<TimelineEvent>,
}

impl ApplicationPatch {
    pub fn status_change(to: ApplicationStatus, event: TimelineEvent) -> Self {
        Self {
            status: Some(to),
            append_events: vec![event],
            ..Default::default()
        }
    }

    pub fn apply_to(&self, app: &mut Application, now: DateTime<Utc>) -> Result<(), StoreError> {
        if self.status == Some(ApplicationStatus::Unrecognized) {
            return Err(StoreError::Invalid("cannot set an unrecognized status".to_string()));
        }

        if let Some(status) = self.status {
            app.status = status;
        }
        if let Some(priority) = self.priority {
            app.priority = priority;
        }
        if let Some(notes) = &self.notes {
            app.notes = Some(notes.clone());
        }

        let dates = [
            (self.applied_date, &mut app.applied_date),
            (self.response_date, &mut app.response_date),
            (self.interview_date, &mut app.interview_date),
            (self.offer_date, &mut app.offer_date),
            (self.last_follow_up_date, &mut app.last_follow_up_date),
            (self.next_follow_up_date, &mut app.next_follow_up_date),
        ];
        for (value, field) in dates {
            if value.is_some() {
                *field = value;
            }
        }

        app.timeline.extend(self.append_events.iter().cloned());
        app.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cv {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub version: u32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCv {
    pub name: String,
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}
