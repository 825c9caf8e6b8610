use crate::completion::CompletionRequest;
use crate::models::{GeneralStatementForm, IncidentReportForm};

const REPORT_MAX_TOKENS: u32 = 1000;
const TRANSLATION_MAX_TOKENS: u32 = 1500;
const STATEMENT_MAX_TOKENS: u32 = 800;

const REPORT_SYSTEM_PROMPT: &str = "You are a medical report assistant that helps CNAs \
(Certified Nursing Assistants) generate incident reports. Generate a formal, grammatically \
correct incident report based on the provided information. The report should be professional \
and suitable for medical documentation.";

// Language codes offered by the client; anything else is passed through as-is
pub fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "zh" => "Chinese",
        "ht" => "Haitian Kreyol",
        "tl" => "Tagalog",
        other => other,
    }
}

pub fn incident_report_prompt(form: &IncidentReportForm) -> CompletionRequest {
    let mut user = String::from(
        "Please generate a formal incident report with the following information:\n\n",
    );
    let fields = [
        ("CNA Name", form.cna_name.as_str()),
        ("Shift Time", form.shift_time.as_str()),
        ("Floor", form.floor.as_str()),
        ("Supervisor on Duty", form.supervisor_on_duty.as_str()),
        ("Patient Name", form.patient_name.as_str()),
        ("Patient Room", form.patient_room.as_str()),
        ("Time of Incident", form.incident_time.as_str()),
        ("Nature of Incident", form.incident_nature.as_str()),
        ("Description of Incident", form.incident_description.as_str()),
        ("Was patient able to state what happened", form.patient_able_to_state.as_str()),
    ];
    for (label, value) in fields {
        user.push_str(&format!("{label}: {}\n", value.trim()));
    }
    if form.patient_could_state() {
        if let Some(statement) = form.patient_statement.as_deref() {
            user.push_str(&format!("Patient's statement: {}\n", statement.trim()));
        }
    }
    user.push_str(&format!("Actions taken by CNA: {}\n", form.cna_actions.trim()));
    if let Some(nurse_actions) = form.nurse_actions.as_deref() {
        user.push_str(&format!("Actions taken by nurse/supervisor: {}\n", nurse_actions.trim()));
    }
    user.push_str(&format!("Supervisor notified: {}\n", form.supervisor_notified.trim()));
    user.push_str(
        "\nThe report should be structured with sections for introduction (stating name, shift \
details), incident description, patient's response, actions taken, and conclusion with current \
date and time. Keep it formal, accurate, and professional.",
    );

    CompletionRequest {
        system: REPORT_SYSTEM_PROMPT.to_string(),
        user,
        max_tokens: REPORT_MAX_TOKENS,
    }
}

pub fn translation_prompt(report_text: &str, target_language: &str) -> CompletionRequest {
    let language = language_name(target_language.trim());
    CompletionRequest {
        system: format!(
            "You are a medical translator that specializes in translating incident reports for \
healthcare facilities. Translate the provided text into {language} while maintaining the formal \
tone, structure, and all medical information. Ensure the translation is grammatically correct \
and uses appropriate medical terminology in the target language."
        ),
        user: report_text.to_string(),
        max_tokens: TRANSLATION_MAX_TOKENS,
    }
}

pub fn general_statement_prompt(form: &GeneralStatementForm) -> CompletionRequest {
    let mut user = format!("Resident Name: {}\n", form.resident_name.trim());
    if let Some(room) = form.room_number.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        user.push_str(&format!("Room Number: {room}\n"));
    }
    user.push_str(&format!("Statement: {}\n", form.raw_statement.trim()));

    CompletionRequest {
        system: "You are a documentation assistant for CNAs (Certified Nursing Assistants). \
Rewrite the CNA's statement about a resident as a clear, professional, grammatically correct \
statement suitable for a resident's care record. Keep every fact from the original, do not add \
information that was not given, and write in the first person as the CNA."
            .to_string(),
        user,
        max_tokens: STATEMENT_MAX_TOKENS,
    }
}
