//! In-memory report, statement and feedback storage.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::{
    FeedbackAnalytics, FeedbackEvent, FeedbackEventForm, FeedbackEventRecord, FeedbackForm,
    FeedbackRecord, FeedbackStats, GeneralStatementForm, GeneralStatementRecord,
    IncidentReportForm, RatingCount, ReportRecord, TermCount,
};

const TOP_TERMS: usize = 5;
const MIN_TERM_LEN: usize = 4;
const RECENT_DAYS: i64 = 7;

#[derive(Debug)]
pub struct MemStorage {
    reports: DashMap<u64, ReportRecord>,
    statements: DashMap<u64, GeneralStatementRecord>,
    feedback: DashMap<u64, FeedbackRecord>,
    feedback_events: DashMap<u64, FeedbackEventRecord>,
    next_id: AtomicU64,
}

impl Default for MemStorage {
    fn default() -> Self {
        Self {
            reports: DashMap::new(),
            statements: DashMap::new(),
            feedback: DashMap::new(),
            feedback_events: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

// Values of a map ordered by id, oldest first
fn sorted_by_id<T: Clone>(map: &DashMap<u64, T>) -> Vec<T> {
    let mut all: Vec<_> = map.iter().map(|e| (*e.key(), e.value().clone())).collect();
    all.sort_by_key(|(id, _)| *id);
    all.into_iter().map(|(_, value)| value).collect()
}

impl MemStorage {
    // Ids are shared across record kinds; only uniqueness and order matter
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn create_report(
        &self,
        form: IncidentReportForm,
        generated_report: String,
    ) -> ReportRecord {
        let id = self.next_id();
        let record = ReportRecord {
            id,
            form,
            generated_report,
            created_at: Utc::now(),
        };
        self.reports.insert(id, record.clone());
        record
    }

    pub fn create_statement(
        &self,
        form: GeneralStatementForm,
        processed_statement: String,
    ) -> GeneralStatementRecord {
        let id = self.next_id();
        let record = GeneralStatementRecord {
            id,
            form,
            processed_statement,
            created_at: Utc::now(),
        };
        self.statements.insert(id, record.clone());
        record
    }

    pub fn get_statement(&self, id: u64) -> Option<GeneralStatementRecord> {
        self.statements.get(&id).map(|s| s.value().clone())
    }

    pub fn all_statements(&self) -> Vec<GeneralStatementRecord> {
        sorted_by_id(&self.statements)
    }

    pub fn create_feedback(&self, form: FeedbackForm, ip_address: &str) -> FeedbackRecord {
        let id = self.next_id();
        let record = FeedbackRecord {
            id,
            form,
            ip_address: ip_address.to_string(),
            submitted_at: Utc::now(),
        };
        self.feedback.insert(id, record.clone());
        record
    }

    // Oldest first, in submission order
    pub fn all_feedback(&self) -> Vec<FeedbackRecord> {
        sorted_by_id(&self.feedback)
    }

    pub fn feedback_stats(&self) -> FeedbackStats {
        let all = self.all_feedback();
        if all.is_empty() {
            return FeedbackStats::empty();
        }

        let total = all.len();
        let average = |rating: fn(&FeedbackForm) -> i64| {
            let sum: i64 = all.iter().map(|f| rating(&f.form)).sum();
            round_one_decimal(sum as f64 / total as f64)
        };

        let rating_distribution = (1..=5)
            .map(|rating| RatingCount {
                rating,
                count: all.iter().filter(|f| f.form.overall_satisfaction == rating).count(),
            })
            .collect();

        FeedbackStats {
            total_responses: total,
            average_usefulness: average(|f| f.usefulness),
            average_ease_of_use: average(|f| f.ease_of_use),
            average_satisfaction: average(|f| f.overall_satisfaction),
            rating_distribution,
            top_features: top_terms(all.iter().map(|f| f.form.most_helpful_feature.as_str())),
            common_suggestions: top_terms(
                all.iter().map(|f| f.form.suggested_improvements.as_str()),
            ),
        }
    }

    pub fn track_feedback_event(
        &self,
        form: FeedbackEventForm,
        ip_address: &str,
        user_agent: Option<String>,
    ) -> FeedbackEventRecord {
        self.record_feedback_event(form, ip_address, user_agent, Utc::now())
    }

    fn record_feedback_event(
        &self,
        form: FeedbackEventForm,
        ip_address: &str,
        user_agent: Option<String>,
        at: DateTime<Utc>,
    ) -> FeedbackEventRecord {
        let id = self.next_id();
        let record = FeedbackEventRecord {
            id,
            event_type: form.event_type,
            form_type: form.form_type,
            ip_address: ip_address.to_string(),
            user_agent,
            timestamp: at,
        };
        self.feedback_events.insert(id, record.clone());
        record
    }

    pub fn feedback_analytics(&self, now: DateTime<Utc>) -> FeedbackAnalytics {
        let events = sorted_by_id(&self.feedback_events);
        let since = now - TimeDelta::days(RECENT_DAYS);
        let count = |kind: FeedbackEvent, recent_only: bool| {
            events
                .iter()
                .filter(|e| e.event_type == kind && (!recent_only || e.timestamp >= since))
                .count()
        };

        let (total_views, total_submissions) =
            (count(FeedbackEvent::View, false), count(FeedbackEvent::Submit, false));
        let (recent_views, recent_submissions) =
            (count(FeedbackEvent::View, true), count(FeedbackEvent::Submit, true));

        FeedbackAnalytics {
            total_views,
            total_submissions,
            conversion_rate: conversion_rate(total_views, total_submissions),
            recent_views,
            recent_submissions,
            recent_conversion_rate: conversion_rate(recent_views, recent_submissions),
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// Submissions per view, as a percentage
fn conversion_rate(views: usize, submissions: usize) -> f64 {
    if views == 0 {
        return 0.0;
    }
    round_one_decimal(submissions as f64 / views as f64 * 100.0)
}

// Most frequent lower-cased words longer than three characters; ties go alphabetically
fn top_terms<'a>(texts: impl Iterator<Item = &'a str>) -> Vec<TermCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for word in text.split_whitespace() {
            if word.chars().count() >= MIN_TERM_LEN {
                *counts.entry(word.to_lowercase()).or_default() += 1;
            }
        }
    }

    let mut terms: Vec<_> = counts.into_iter().collect();
    terms.sort_by(|(a_word, a_count), (b_word, b_count)| {
        b_count.cmp(a_count).then_with(|| a_word.cmp(b_word))
    });
    terms
        .into_iter()
        .take(TOP_TERMS)
        .map(|(feature, count)| TermCount { feature, count })
        .collect()
}
