use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

// Field name -> validation message
pub type FieldErrors = BTreeMap<String, String>;

// ISO-8601 with millisecond precision, e.g. 2026-03-01T08:00:00.000Z
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn serialize_timestamp<S: Serializer>(
    at: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(at))
}

fn require(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field.to_string(), "Required".to_string());
    }
}

fn finish(errors: FieldErrors) -> Result<(), FieldErrors> {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// Incident report form as submitted by the CNA.
// Missing fields deserialize as empty so validation can name them.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct IncidentReportForm {
    pub cna_name: String,
    pub shift_time: String,
    pub floor: String,
    pub supervisor_on_duty: String,
    pub patient_name: String,
    pub patient_room: String,
    pub incident_time: String,
    pub incident_nature: String,
    pub incident_description: String,
    pub patient_able_to_state: String,
    pub patient_statement: Option<String>,
    pub cna_actions: String,
    pub nurse_actions: Option<String>,
    pub supervisor_notified: String,
}

impl IncidentReportForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require(&mut errors, "cnaName", &self.cna_name);
        require(&mut errors, "shiftTime", &self.shift_time);
        require(&mut errors, "floor", &self.floor);
        require(&mut errors, "supervisorOnDuty", &self.supervisor_on_duty);
        require(&mut errors, "patientName", &self.patient_name);
        require(&mut errors, "patientRoom", &self.patient_room);
        require(&mut errors, "incidentTime", &self.incident_time);
        require(&mut errors, "incidentNature", &self.incident_nature);
        require(&mut errors, "incidentDescription", &self.incident_description);
        require(&mut errors, "patientAbleToState", &self.patient_able_to_state);
        require(&mut errors, "cnaActions", &self.cna_actions);
        require(&mut errors, "supervisorNotified", &self.supervisor_notified);
        finish(errors)
    }

    pub fn patient_could_state(&self) -> bool {
        self.patient_able_to_state.trim().eq_ignore_ascii_case("yes")
    }
}

// Stored report - the form plus the generated text
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub id: u64,
    #[serde(flatten)]
    pub form: IncidentReportForm,
    pub generated_report: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslateRequest {
    pub report_text: String,
    pub target_language: String,
}

impl TranslateRequest {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require(&mut errors, "reportText", &self.report_text);
        require(&mut errors, "targetLanguage", &self.target_language);
        finish(errors)
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translated_report: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackForm {
    pub usefulness: i64,
    pub ease_of_use: i64,
    pub overall_satisfaction: i64,
    pub most_helpful_feature: String,
    pub suggested_improvements: String,
    pub additional_comments: Option<String>,
}

impl FeedbackForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for (field, rating) in [
            ("usefulness", self.usefulness),
            ("easeOfUse", self.ease_of_use),
            ("overallSatisfaction", self.overall_satisfaction),
        ] {
            if !(1..=5).contains(&rating) {
                errors.insert(field.to_string(), "Must be between 1 and 5".to_string());
            }
        }
        require(&mut errors, "mostHelpfulFeature", &self.most_helpful_feature);
        require(&mut errors, "suggestedImprovements", &self.suggested_improvements);
        finish(errors)
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: u64,
    #[serde(flatten)]
    pub form: FeedbackForm,
    pub ip_address: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct RatingCount {
    pub rating: i64,
    pub count: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TermCount {
    pub feature: String,
    pub count: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub total_responses: usize,
    pub average_usefulness: f64,
    pub average_ease_of_use: f64,
    pub average_satisfaction: f64,
    pub rating_distribution: Vec<RatingCount>,
    pub top_features: Vec<TermCount>,
    pub common_suggestions: Vec<TermCount>,
}

impl FeedbackStats {
    pub fn empty() -> Self {
        Self {
            total_responses: 0,
            average_usefulness: 0.0,
            average_ease_of_use: 0.0,
            average_satisfaction: 0.0,
            rating_distribution: Vec::new(),
            top_features: Vec::new(),
            common_suggestions: Vec::new(),
        }
    }
}

const MIN_STATEMENT_LEN: usize = 10;

// Free-text statement about a resident, rewritten by the model
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralStatementForm {
    pub resident_name: String,
    pub room_number: Option<String>,
    pub raw_statement: String,
}

impl GeneralStatementForm {
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        require(&mut errors, "residentName", &self.resident_name);
        if self.raw_statement.trim().chars().count() < MIN_STATEMENT_LEN {
            errors.insert(
                "rawStatement".to_string(),
                format!("Must be at least {MIN_STATEMENT_LEN} characters"),
            );
        }
        finish(errors)
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GeneralStatementRecord {
    pub id: u64,
    #[serde(flatten)]
    pub form: GeneralStatementForm,
    pub processed_statement: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedStatement {
    pub id: u64,
    pub processed_statement: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<&GeneralStatementRecord> for ProcessedStatement {
    fn from(record: &GeneralStatementRecord) -> Self {
        Self {
            id: record.id,
            processed_statement: record.processed_statement.clone(),
            created_at: record.created_at,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackEvent {
    View,
    Submit,
}

fn default_form_type() -> String {
    "feedback".to_string()
}

// Feedback form interaction reported by the client
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEventForm {
    pub event_type: FeedbackEvent,
    #[serde(default = "default_form_type")]
    pub form_type: String,
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEventRecord {
    pub id: u64,
    pub event_type: FeedbackEvent,
    pub form_type: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

// View -> submit conversion, overall and for the trailing week
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAnalytics {
    pub total_views: usize,
    pub total_submissions: usize,
    pub conversion_rate: f64,
    pub recent_views: usize,
    pub recent_submissions: usize,
    pub recent_conversion_rate: f64,
}
