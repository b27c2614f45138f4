//! Aggregations over one owner's full set of applications.
//!
//! Every function here is pure and total: records missing a field a
//! computation needs are left out of that computation, never reported as
//! errors. Day differences are whole calendar days in the time zone of `now`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::models::{Application, ApplicationStatus, JobSource, Priority};

pub type StatusCounts = BTreeMap<ApplicationStatus, usize>;
pub type SourceCounts = BTreeMap<JobSource, usize>;
pub type PriorityCounts = BTreeMap<Priority, usize>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConversionRates {
    /// Share of the applied funnel that reached an interview, 0-100.
    pub applied_to_interview: f64,
    /// Share of interviews that became offers, 0-100.
    pub interview_to_offer: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyCount {
    pub company: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowUpDue<'a> {
    pub application: &'a Application,
    /// Last follow-up if any, else the applied date.
    pub reference: DateTime<Utc>,
    pub days_since_contact: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub total: usize,
    pub by_status: StatusCounts,
    pub by_source: SourceCounts,
    pub average_response_days: f64,
    pub conversion: ConversionRates,
    pub this_week: usize,
    pub this_month: usize,
}

pub fn summarize<Tz: TimeZone>(applications: &[Application], now: &DateTime<Tz>) -> AnalyticsSummary {
    AnalyticsSummary {
        total: applications.len(),
        by_status: count_by_status(applications),
        by_source: count_by_source(applications),
        average_response_days: average_response_time_days(applications),
        conversion: conversion_rates(applications),
        this_week: applications_this_week(applications, now),
        this_month: applications_this_month(applications, now),
    }
}

/// Every status, `Unrecognized` included, is a key.
pub fn count_by_status(applications: &[Application]) -> StatusCounts {
    let mut counts: StatusCounts = ApplicationStatus::ALL
        .iter()
        .chain(std::iter::once(&ApplicationStatus::Unrecognized))
        .map(|status| (*status, 0))
        .collect();
    for app in applications {
        *counts.entry(app.status).or_insert(0) += 1;
    }
    counts
}

pub fn count_by_source(applications: &[Application]) -> SourceCounts {
    let mut counts: SourceCounts = JobSource::ALL
        .iter()
        .chain(std::iter::once(&JobSource::Unrecognized))
        .map(|source| (*source, 0))
        .collect();
    for app in applications {
        *counts.entry(app.source).or_insert(0) += 1;
    }
    counts
}

pub fn count_by_priority(applications: &[Application]) -> PriorityCounts {
    let mut counts: PriorityCounts = Priority::ALL.iter().map(|p| (*p, 0)).collect();
    for app in applications {
        *counts.entry(app.priority).or_insert(0) += 1;
    }
    counts
}

/// Mean days from applying to hearing back, over records that have both dates.
pub fn average_response_time_days(applications: &[Application]) -> f64 {
    let days: Vec<i64> = applications
        .iter()
        .filter_map(|app| match (app.applied_date, app.response_date) {
            (Some(applied), Some(response)) => Some(calendar_days(&applied, &response, &Utc)),
            _ => None,
        })
        .collect();

    if days.is_empty() {
        return 0.0;
    }
    days.iter().sum::<i64>() as f64 / days.len() as f64
}

/// Conversion measured against the funnel superset, so `saved` leads never
/// drag the rates down.
pub fn conversion_rates(applications: &[Application]) -> ConversionRates {
    let funnel = applications.iter().filter(|a| a.status.in_funnel()).count();
    let interviewing = applications.iter().filter(|a| a.status.reached_interview()).count();
    let offers = applications
        .iter()
        .filter(|a| a.status == ApplicationStatus::Offer)
        .count();

    ConversionRates {
        applied_to_interview: percentage(interviewing, funnel),
        interview_to_offer: percentage(offers, interviewing),
    }
}

/// Created within the Monday-start week containing `now`.
pub fn applications_this_week<Tz: TimeZone>(applications: &[Application], now: &DateTime<Tz>) -> usize {
    let tz = now.timezone();
    let start = week_start(now.date_naive());
    let end = start + Duration::days(7);
    applications
        .iter()
        .filter(|app| {
            let created = app.created_at.with_timezone(&tz).date_naive();
            created >= start && created < end
        })
        .count()
}

/// Created within the calendar month containing `now`.
pub fn applications_this_month<Tz: TimeZone>(applications: &[Application], now: &DateTime<Tz>) -> usize {
    let tz = now.timezone();
    let today = now.date_naive();
    applications
        .iter()
        .filter(|app| {
            let created = app.created_at.with_timezone(&tz).date_naive();
            created.year() == today.year() && created.month() == today.month()
        })
        .count()
}

/// Dense weekly creation counts: `weeks_back` buckets, oldest first, the last
/// one being the week containing `now`. Weeks before the earliest
/// representable date are left out.
pub fn weekly_trend<Tz: TimeZone>(
    applications: &[Application],
    weeks_back: usize,
    now: &DateTime<Tz>,
) -> Vec<WeekBucket> {
    let tz = now.timezone();
    let current = week_start(now.date_naive());

    let mut per_week: HashMap<NaiveDate, usize> = HashMap::new();
    for app in applications {
        let created = app.created_at.with_timezone(&tz).date_naive();
        *per_week.entry(week_start(created)).or_insert(0) += 1;
    }

    let representable = usize::try_from((current - NaiveDate::MIN).num_weeks())
        .unwrap_or(0)
        .saturating_add(1);

    (0..weeks_back.min(representable))
        .rev()
        .filter_map(|weeks_ago| {
            let start = current.checked_sub_signed(Duration::weeks(weeks_ago as i64))?;
            Some(WeekBucket {
                week_start: start,
                label: format!("{}/{}", start.day(), start.month()),
                count: per_week.get(&start).copied().unwrap_or(0),
            })
        })
        .collect()
}

/// Interviews at or after `now`, soonest first.
pub fn upcoming_interviews<'a, Tz: TimeZone>(
    applications: &'a [Application],
    now: &DateTime<Tz>,
    limit: usize,
) -> Vec<&'a Application> {
    let now = now.with_timezone(&Utc);
    let mut upcoming: Vec<&Application> = applications
        .iter()
        .filter(|app| app.interview_date.is_some_and(|date| date >= now))
        .collect();
    upcoming.sort_by_key(|app| app.interview_date);
    upcoming.truncate(limit);
    upcoming
}

/// Applications that have gone quiet for at least `days_threshold` days.
///
/// Saved, rejected and withdrawn applications never need a follow-up, and
/// nothing without an applied date is considered. Oldest contact first.
pub fn needing_follow_up<'a, Tz: TimeZone>(
    applications: &'a [Application],
    now: &DateTime<Tz>,
    days_threshold: i64,
    limit: usize,
) -> Vec<FollowUpDue<'a>> {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);

    let mut due: Vec<FollowUpDue> = applications
        .iter()
        .filter(|app| {
            !matches!(
                app.status,
                ApplicationStatus::Saved | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
            )
        })
        .filter_map(|app| {
            let applied = app.applied_date?;
            let reference = app.last_follow_up_date.unwrap_or(applied);
            let days_since_contact = calendar_days(&reference, &now_utc, &tz);
            (days_since_contact >= days_threshold).then_some(FollowUpDue {
                application: app,
                reference,
                days_since_contact,
            })
        })
        .collect();

    due.sort_by_key(|d| d.reference);
    due.truncate(limit);
    due
}

/// Companies with the most applications, ties broken alphabetically.
pub fn top_companies(applications: &[Application], limit: usize) -> Vec<CompanyCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for app in applications {
        let company = app.company.trim();
        if !company.is_empty() {
            *counts.entry(company).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<CompanyCount> = counts
        .into_iter()
        .map(|(company, count)| CompanyCount {
            company: company.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.company.cmp(&b.company)));
    ranked.truncate(limit);
    ranked
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date.checked_sub_signed(Duration::days(date.weekday().num_days_from_monday() as i64))
        .unwrap_or(NaiveDate::MIN)
}

fn calendar_days<Tz: TimeZone>(from: &DateTime<Utc>, to: &DateTime<Utc>, tz: &Tz) -> i64 {
    let from = from.with_timezone(tz).date_naive();
    let to = to.with_timezone(tz).date_naive();
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewApplication;
    use chrono::FixedOffset;

    fn ts(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0).unwrap()
    }

    fn app(status: ApplicationStatus) -> Application {
        let mut app = Application::create("owner", NewApplication::new("Engineer", "Acme"), ts(1, 1, 9)).unwrap();
        app.status = status;
        app
    }

    fn created(at: DateTime<Utc>) -> Application {
        let mut app = app(ApplicationStatus::Saved);
        app.created_at = at;
        app
    }

    #[test]
    fn test_counts_by_status_cover_every_status() {
        let apps = vec![
            app(ApplicationStatus::Saved),
            app(ApplicationStatus::Applied),
            app(ApplicationStatus::Offer),
        ];
        let counts = count_by_status(&apps);

        assert_eq!(counts[&ApplicationStatus::Saved], 1);
        assert_eq!(counts[&ApplicationStatus::Applied], 1);
        assert_eq!(counts[&ApplicationStatus::Offer], 1);
        for status in [ApplicationStatus::Interview, ApplicationStatus::Archived, ApplicationStatus::Unrecognized] {
            assert_eq!(counts[&status], 0);
        }
        assert_eq!(counts.len(), ApplicationStatus::ALL.len() + 1);
        assert_eq!(counts.values().sum::<usize>(), apps.len());
    }

    #[test]
    fn test_conversion_uses_funnel_superset() {
        let apps = vec![
            app(ApplicationStatus::Saved),
            app(ApplicationStatus::Applied),
            app(ApplicationStatus::Offer),
        ];
        let rates = conversion_rates(&apps);
        assert_eq!(rates.applied_to_interview, 50.0);
        assert_eq!(rates.interview_to_offer, 100.0);
    }

    #[test]
    fn test_conversion_zero_denominators() {
        let rates = conversion_rates(&[app(ApplicationStatus::Saved), app(ApplicationStatus::Rejected)]);
        assert_eq!(rates.applied_to_interview, 0.0);
        assert_eq!(rates.interview_to_offer, 0.0);
    }

    #[test]
    fn test_conversion_stays_within_bounds() {
        let mixes: Vec<Vec<ApplicationStatus>> = vec![
            vec![ApplicationStatus::Offer; 4],
            vec![ApplicationStatus::Applied, ApplicationStatus::PhoneScreen, ApplicationStatus::Technical],
            vec![ApplicationStatus::Interview, ApplicationStatus::Withdrawn, ApplicationStatus::Archived],
            ApplicationStatus::ALL.to_vec(),
        ];
        for mix in mixes {
            let apps: Vec<_> = mix.into_iter().map(app).collect();
            let rates = conversion_rates(&apps);
            assert!((0.0..=100.0).contains(&rates.applied_to_interview));
            assert!((0.0..=100.0).contains(&rates.interview_to_offer));
        }
    }

    #[test]
    fn test_average_response_time_skips_incomplete_records() {
        let mut answered = app(ApplicationStatus::Applied);
        answered.applied_date = Some(ts(3, 1, 9));
        answered.response_date = Some(ts(3, 6, 9));
        let mut waiting = app(ApplicationStatus::Applied);
        waiting.applied_date = Some(ts(3, 1, 9));

        assert_eq!(average_response_time_days(&[answered, waiting]), 5.0);
    }

    #[test]
    fn test_average_response_time_counts_calendar_days() {
        // Two hours apart but across midnight
        let mut late = app(ApplicationStatus::Applied);
        late.applied_date = Some(ts(3, 1, 23));
        late.response_date = Some(Utc.with_ymd_and_hms(2025, 3, 2, 1, 0, 0).unwrap());
        assert_eq!(average_response_time_days(&[late]), 1.0);
    }

    #[test]
    fn test_empty_input_yields_zero_values() {
        let now = ts(3, 5, 12);
        let summary = summarize(&[], &now);

        assert_eq!(summary.total, 0);
        assert!(summary.by_status.values().all(|c| *c == 0));
        assert!(summary.by_source.values().all(|c| *c == 0));
        assert_eq!(summary.average_response_days, 0.0);
        assert_eq!(summary.conversion.applied_to_interview, 0.0);
        assert_eq!(summary.this_week, 0);
        assert_eq!(summary.this_month, 0);

        let trend = weekly_trend(&[], 8, &now);
        assert_eq!(trend.len(), 8);
        assert!(trend.iter().all(|w| w.count == 0));
        assert!(upcoming_interviews(&[], &now, 5).is_empty());
        assert!(needing_follow_up(&[], &now, 7, 10).is_empty());
        assert!(top_companies(&[], 5).is_empty());
    }

    #[test]
    fn test_this_week_is_monday_based() {
        // 2025-03-05 is a Wednesday; its week runs 03-03 .. 03-09
        let now = ts(3, 5, 12);
        let apps = vec![
            created(ts(3, 2, 23)), // Sunday before
            created(ts(3, 3, 0)),  // Monday
            created(ts(3, 9, 22)), // Sunday end
            created(ts(3, 10, 0)), // next Monday
        ];
        assert_eq!(applications_this_week(&apps, &now), 2);
    }

    #[test]
    fn test_this_week_follows_the_time_zone_of_now() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = ts(3, 5, 12).with_timezone(&plus_two);
        // Sunday 23:30 UTC is already Monday 01:30 at +02:00
        let apps = vec![created(Utc.with_ymd_and_hms(2025, 3, 2, 23, 30, 0).unwrap())];
        assert_eq!(applications_this_week(&apps, &now), 1);
        assert_eq!(applications_this_week(&apps, &ts(3, 5, 12)), 0);
    }

    #[test]
    fn test_this_month() {
        let now = ts(3, 15, 12);
        let apps = vec![
            created(ts(2, 28, 23)),
            created(ts(3, 1, 0)),
            created(ts(3, 31, 23)),
            created(Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()),
        ];
        assert_eq!(applications_this_month(&apps, &now), 2);
    }

    #[test]
    fn test_weekly_trend_is_dense_and_chronological() {
        let now = ts(3, 5, 12);
        let apps = vec![
            created(ts(3, 4, 9)),
            created(ts(3, 3, 9)),
            created(ts(2, 18, 9)),
            created(ts(1, 1, 9)), // outside the window
        ];
        let trend = weekly_trend(&apps, 8, &now);

        assert_eq!(trend.len(), 8);
        assert!(trend.windows(2).all(|w| w[0].week_start < w[1].week_start));
        assert!(trend.iter().all(|w| w.week_start.weekday() == chrono::Weekday::Mon));

        let last = trend.last().unwrap();
        assert_eq!(last.week_start, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(last.label, "3/3");
        assert_eq!(last.count, 2);
        assert_eq!(trend[5].week_start, NaiveDate::from_ymd_opt(2025, 2, 17).unwrap());
        assert_eq!(trend[5].count, 1);
        assert_eq!(trend.iter().map(|w| w.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_weekly_trend_length_matches_request() {
        let now = ts(3, 5, 12);
        assert_eq!(weekly_trend(&[], 1, &now).len(), 1);
        assert_eq!(weekly_trend(&[], 12, &now).len(), 12);
        assert!(weekly_trend(&[], 0, &now).is_empty());
    }

    #[test]
    fn test_weekly_trend_stops_at_earliest_date() {
        let now = (NaiveDate::MIN + Duration::days(10))
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        let trend = weekly_trend(&[], usize::MAX, &now);

        assert!(!trend.is_empty());
        assert!(trend.len() <= 3);
        assert!(trend.iter().all(|w| w.week_start >= NaiveDate::MIN));
        assert_eq!(trend.last().unwrap().week_start, week_start(now.date_naive()));

        let far_back = weekly_trend(&[], 5_000, &ts(3, 5, 12));
        assert_eq!(far_back.len(), 5_000);
    }

    #[test]
    fn test_upcoming_interviews_sorted_and_limited() {
        let now = ts(3, 5, 12);
        let mut apps = Vec::new();
        for (day, company) in [(9, "Later"), (6, "Soon"), (1, "Past"), (20, "Latest")] {
            let mut a = app(ApplicationStatus::Interview);
            a.company = company.to_string();
            a.interview_date = Some(ts(3, day, 10));
            apps.push(a);
        }
        apps.push(app(ApplicationStatus::Interview)); // no date

        let upcoming: Vec<_> = upcoming_interviews(&apps, &now, 2)
            .into_iter()
            .map(|a| a.company.as_str())
            .collect();
        assert_eq!(upcoming, vec!["Soon", "Later"]);
        assert_eq!(upcoming_interviews(&apps, &now, 5).len(), 3);
    }

    #[test]
    fn test_interview_exactly_now_is_upcoming() {
        let now = ts(3, 5, 12);
        let mut a = app(ApplicationStatus::Interview);
        a.interview_date = Some(now);
        assert_eq!(upcoming_interviews(&[a], &now, 5).len(), 1);
    }

    #[test]
    fn test_follow_up_excludes_closed_and_unapplied() {
        let now = ts(3, 20, 12);
        let mut apps = Vec::new();
        for status in [
            ApplicationStatus::Saved,
            ApplicationStatus::Rejected,
            ApplicationStatus::Withdrawn,
            ApplicationStatus::Applied,
        ] {
            let mut a = app(status);
            a.applied_date = Some(ts(3, 1, 9));
            apps.push(a);
        }
        apps.push(app(ApplicationStatus::Interview)); // never applied

        let due = needing_follow_up(&apps, &now, 7, 10);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].application.status, ApplicationStatus::Applied);
        assert_eq!(due[0].days_since_contact, 19);
    }

    #[test]
    fn test_follow_up_uses_last_contact_and_threshold_is_inclusive() {
        let now = ts(3, 20, 12);

        let mut recently_chased = app(ApplicationStatus::Applied);
        recently_chased.applied_date = Some(ts(2, 1, 9));
        recently_chased.last_follow_up_date = Some(ts(3, 18, 9));

        let mut exactly_a_week = app(ApplicationStatus::PhoneScreen);
        exactly_a_week.applied_date = Some(ts(3, 13, 23));

        let mut six_days = app(ApplicationStatus::Technical);
        six_days.applied_date = Some(ts(3, 14, 0));

        let apps = [recently_chased, exactly_a_week, six_days];
        let due = needing_follow_up(&apps, &now, 7, 10);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].application.status, ApplicationStatus::PhoneScreen);
        assert_eq!(due[0].days_since_contact, 7);
    }

    #[test]
    fn test_follow_up_oldest_first_and_limited() {
        let now = ts(3, 30, 12);
        let mut apps = Vec::new();
        for (day, company) in [(10, "Mid"), (2, "Oldest"), (15, "Newest")] {
            let mut a = app(ApplicationStatus::Applied);
            a.company = company.to_string();
            a.applied_date = Some(ts(1, 1, 9));
            a.last_follow_up_date = Some(ts(3, day, 9));
            apps.push(a);
        }

        let due: Vec<_> = needing_follow_up(&apps, &now, 7, 2)
            .into_iter()
            .map(|d| d.application.company.as_str())
            .collect();
        assert_eq!(due, vec!["Oldest", "Mid"]);
    }

    #[test]
    fn test_unrecognized_values_are_counted_not_dropped() {
        let mut odd = app(ApplicationStatus::Unrecognized);
        odd.source = JobSource::Unrecognized;
        let apps = vec![odd, app(ApplicationStatus::Applied)];

        assert_eq!(count_by_status(&apps)[&ApplicationStatus::Unrecognized], 1);
        assert_eq!(count_by_source(&apps)[&JobSource::Unrecognized], 1);
        assert_eq!(count_by_source(&apps).values().sum::<usize>(), 2);
    }

    #[test]
    fn test_priority_and_top_companies() {
        let mut apps = Vec::new();
        for (company, priority) in [("Beta", Priority::High), ("Alpha", Priority::Low), ("Beta", Priority::High), ("Alpha", Priority::Medium), ("Gamma", Priority::Medium)] {
            let mut a = app(ApplicationStatus::Applied);
            a.company = company.to_string();
            a.priority = priority;
            apps.push(a);
        }

        let priorities = count_by_priority(&apps);
        assert_eq!(priorities[&Priority::High], 2);
        assert_eq!(priorities[&Priority::Medium], 2);
        assert_eq!(priorities[&Priority::Low], 1);

        let top = top_companies(&apps, 2);
        assert_eq!(
            top,
            vec![
                CompanyCount { company: "Alpha".to_string(), count: 2 },
                CompanyCount { company: "Beta".to_string(), count: 2 },
            ]
        );
    }

    #[test]
    fn test_summary_serializes_status_keys_as_strings() {
        let summary = summarize(&[app(ApplicationStatus::PhoneScreen)], &ts(3, 5, 12));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["by_status"]["phone_screen"], 1);
        assert_eq!(json["by_source"]["other"], 1);
    }
}
