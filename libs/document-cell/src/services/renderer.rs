//! `{{ key }}` placeholder substitution for document templates.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use serde_json::Value;

use patient_cell::Patient;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z0-9_.]+)\s*\}\}").expect("placeholder pattern compiles")
});

/// Values a template can reference. Lookup order is explicit fields, then
/// `patient.*`, then the `today`/`now` built-ins.
pub struct RenderContext<'a> {
    fields: &'a HashMap<String, String>,
    patient: HashMap<String, String>,
    now: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate {
    pub content: String,
    pub missing_fields: Vec<String>,
}

fn patient_values(patient: &Patient) -> HashMap<String, String> {
    let mut values = HashMap::new();

    if let Ok(Value::Object(columns)) = serde_json::to_value(patient) {
        for (column, value) in columns {
            let rendered = match value {
                Value::Null => continue,
                Value::String(s) => s,
                other => other.to_string(),
            };
            values.insert(format!("patient.{}", column), rendered);
        }
    }

    if let Some(birth_date) = patient.birth_date {
        values.insert("patient.birth_date".to_string(), format_date(birth_date));
    }
    if let Some(age) = patient.age() {
        values.insert("patient.age".to_string(), age.to_string());
    }
    values.insert("patient.first_name".to_string(), patient.first_name().to_string());

    values
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

impl<'a> RenderContext<'a> {
    pub fn new(fields: &'a HashMap<String, String>, patient: Option<&Patient>, now: NaiveDateTime) -> Self {
        Self {
            fields,
            patient: patient.map(patient_values).unwrap_or_default(),
            now,
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        if let Some(value) = self.fields.get(key) {
            return Some(value.clone());
        }
        if let Some(value) = self.patient.get(key) {
            return Some(value.clone());
        }
        match key {
            "today" => Some(format_date(self.now.date())),
            "now" => Some(self.now.format("%d/%m/%Y %H:%M").to_string()),
            _ => None,
        }
    }
}

pub fn render_template(body: &str, context: &RenderContext<'_>) -> RenderedTemplate {
    let mut missing = BTreeSet::new();

    let content = PLACEHOLDER_RE.replace_all(body, |caps: &Captures<'_>| {
        let key = &caps[1];
        context.lookup(key).unwrap_or_else(|| {
            missing.insert(key.to_string());
            String::new()
        })
    });

    RenderedTemplate {
        content: content.into_owned(),
        missing_fields: missing.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient() -> Patient {
        serde_json::from_value(json!({
            "id": "6f1c1c52-7a38-4b39-9a3c-1f8a7f0c9e11",
            "full_name": "José Pereira",
            "phone": "5519998887766",
            "email": null,
            "cpf": "123.456.789-00",
            "birth_date": "1948-07-02",
            "address": null,
            "city": "Campinas",
            "notes": null,
            "hearing_loss_type": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 0)
            .unwrap()
    }

    #[test]
    fn substitutes_patient_columns_and_builtins() {
        let fields = HashMap::new();
        let patient = patient();
        let context = RenderContext::new(&fields, Some(&patient), noon());

        let rendered = render_template(
            "Paciente: {{patient.full_name}} ({{ patient.cpf }}), nascido em {{patient.birth_date}}. Campinas, {{today}} às {{ now }}.",
            &context,
        );

        assert_eq!(
            rendered.content,
            "Paciente: José Pereira (123.456.789-00), nascido em 02/07/1948. Campinas, 05/03/2024 às 05/03/2024 14:07."
        );
        assert!(rendered.missing_fields.is_empty());
    }

    #[test]
    fn explicit_fields_win_over_patient_values() {
        let fields = HashMap::from([("patient.city".to_string(), "Valinhos".to_string())]);
        let patient = patient();
        let context = RenderContext::new(&fields, Some(&patient), noon());

        let rendered = render_template("{{ patient.city }}", &context);
        assert_eq!(rendered.content, "Valinhos");
    }

    #[test]
    fn unknown_and_null_keys_are_reported_once_sorted() {
        let fields = HashMap::new();
        let patient = patient();
        let context = RenderContext::new(&fields, Some(&patient), noon());

        let rendered = render_template(
            "{{device}} / {{ patient.email }} / {{device}} / {{ amount }}",
            &context,
        );

        assert_eq!(rendered.content, " /  /  / ");
        assert_eq!(rendered.missing_fields, vec!["amount", "device", "patient.email"]);
    }

    #[test]
    fn malformed_placeholders_are_left_alone() {
        let fields = HashMap::new();
        let context = RenderContext::new(&fields, None, noon());

        let rendered = render_template("{{ not valid }} {today}", &context);
        assert_eq!(rendered.content, "{{ not valid }} {today}");
        assert!(rendered.missing_fields.is_empty());
    }
}
