//! Structural validation of resume documents
//!
//! Known fields are optional but, when present, must have the declared type;
//! `null` counts as present. Unknown fields are never inspected. Validation
//! collects every issue instead of stopping at the first one so callers get
//! complete field-level feedback.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::resume::Resume;

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
            .unwrap();
}

/// One failed check, addressed by a dotted path (`experience.0.company`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub path: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Text,
    Email,
    Url,
    TextList,
    Records(&'static [(&'static str, FieldKind)]),
}

const EXPERIENCE: &[(&str, FieldKind)] = &[
    ("company", FieldKind::Text),
    ("position", FieldKind::Text),
    ("startDate", FieldKind::Text),
    ("endDate", FieldKind::Text),
    ("description", FieldKind::Text),
    ("achievements", FieldKind::TextList),
];

const EDUCATION: &[(&str, FieldKind)] = &[
    ("institution", FieldKind::Text),
    ("degree", FieldKind::Text),
    ("field", FieldKind::Text),
    ("startDate", FieldKind::Text),
    ("endDate", FieldKind::Text),
    ("gpa", FieldKind::Text),
];

const CERTIFICATIONS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("issuer", FieldKind::Text),
    ("date", FieldKind::Text),
    ("expiryDate", FieldKind::Text),
];

const PROJECTS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("description", FieldKind::Text),
    ("technologies", FieldKind::TextList),
    ("url", FieldKind::Url),
    ("github", FieldKind::Url),
];

const LANGUAGES: &[(&str, FieldKind)] = &[
    ("language", FieldKind::Text),
    ("proficiency", FieldKind::Text),
];

const RESUME: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("email", FieldKind::Email),
    ("phone", FieldKind::Text),
    ("location", FieldKind::Text),
    ("summary", FieldKind::Text),
    ("experience", FieldKind::Records(EXPERIENCE)),
    ("education", FieldKind::Records(EDUCATION)),
    ("skills", FieldKind::TextList),
    ("certifications", FieldKind::Records(CERTIFICATIONS)),
    ("projects", FieldKind::Records(PROJECTS)),
    ("languages", FieldKind::Records(LANGUAGES)),
];

/// Validate a candidate document and convert it into a [`Resume`]
///
/// Every known field is optional, so the same check serves full documents and
/// partial documents alike.
pub fn validate_resume(value: &Value) -> Result<Resume, Vec<FieldIssue>> {
    let issues = check_resume(value);
    if !issues.is_empty() {
        return Err(issues);
    }
    serde_json::from_value(value.clone()).map_err(|e| vec![FieldIssue::new("", e.to_string())])
}

/// List every schema violation in `value`; empty means valid
pub fn check_resume(value: &Value) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    match value {
        Value::Object(map) => check_object(map, RESUME, "", &mut issues),
        other => issues.push(FieldIssue::new("", expected("object", other))),
    }
    issues
}

fn check_object(
    map: &Map<String, Value>,
    fields: &[(&str, FieldKind)],
    prefix: &str,
    issues: &mut Vec<FieldIssue>,
) {
    for (key, kind) in fields {
        if let Some(value) = map.get(*key) {
            check_field(value, *kind, &join(prefix, key), issues);
        }
    }
}

fn check_field(value: &Value, kind: FieldKind, path: &str, issues: &mut Vec<FieldIssue>) {
    match kind {
        FieldKind::Text => {
            if !value.is_string() {
                issues.push(FieldIssue::new(path, expected("string", value)));
            }
        }
        FieldKind::Email => match value.as_str() {
            Some(s) if is_email(s) => {}
            Some(_) => issues.push(FieldIssue::new(path, "Invalid email")),
            None => issues.push(FieldIssue::new(path, expected("string", value))),
        },
        FieldKind::Url => match value.as_str() {
            Some(s) if url::Url::parse(s).is_ok() => {}
            Some(_) => issues.push(FieldIssue::new(path, "Invalid url")),
            None => issues.push(FieldIssue::new(path, expected("string", value))),
        },
        FieldKind::TextList => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    check_field(item, FieldKind::Text, &join(path, &i.to_string()), issues);
                }
            }
            None => issues.push(FieldIssue::new(path, expected("array", value))),
        },
        FieldKind::Records(fields) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    let item_path = join(path, &i.to_string());
                    match item {
                        Value::Object(map) => check_object(map, fields, &item_path, issues),
                        other => issues.push(FieldIssue::new(item_path, expected("object", other))),
                    }
                }
            }
            None => issues.push(FieldIssue::new(path, expected("array", value))),
        },
    }
}

fn is_email(s: &str) -> bool {
    !s.starts_with('.') && !s.contains("..") && EMAIL.is_match(s)
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn expected(kind: &str, actual: &Value) -> String {
    format!("Expected {}, received {}", kind, type_name(actual))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
