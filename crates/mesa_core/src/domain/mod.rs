use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

mod departments;

pub use departments::{Departments, DepartmentsInput};

/// Sentinel problem type used when an imported value is outside the controlled vocabulary.
pub const OTHER_PROBLEM_TYPE: &str = "Otro";

/// Display label for reports without an assignee.
pub const UNASSIGNED_LABEL: &str = "Sin asignar";

/// Server-assigned opaque identifier. Numeric ids on the wire are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportId(String);

impl ReportId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReportId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl Serialize for ReportId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ReportId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdRepr {
            Text(String),
            Number(i64),
        }

        match IdRepr::deserialize(deserializer)? {
            IdRepr::Text(s) if s.trim().is_empty() => {
                Err(serde::de::Error::custom("report id must not be blank"))
            }
            IdRepr::Text(s) => Ok(Self(s.trim().to_string())),
            IdRepr::Number(n) => Ok(Self(n.to_string())),
        }
    }
}

/// Lowercase, strip Spanish accents, and collapse separators so labels compare loosely.
pub(crate) fn fold_label(raw: &str) -> String {
    let mapped: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            '_' | '-' => ' ',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Severity, totally ordered `Baja < Media < Alta < Crítica`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub enum Priority {
    #[default]
    Baja,
    Media,
    Alta,
    Critica,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Baja,
        Priority::Media,
        Priority::Alta,
        Priority::Critica,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Priority::Baja => "Baja",
            Priority::Media => "Media",
            Priority::Alta => "Alta",
            Priority::Critica => "Crítica",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "baja" | "low" => Some(Priority::Baja),
            "media" | "medium" => Some(Priority::Media),
            "alta" | "high" => Some(Priority::Alta),
            "critica" | "critical" => Some(Priority::Critica),
            _ => None,
        }
    }

    /// Unknown values fall back to the lowest severity.
    pub fn coerce(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }
}

/// Any wire value is accepted: text is coerced, `null`, numbers and other shapes become the default.
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(lenient_label(deserializer)?
            .map(|raw| Self::coerce(&raw))
            .unwrap_or_default())
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        p.label().to_string()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle state. Any status may move to any other; `Resuelto` is the reporting terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum Status {
    #[default]
    Pendiente,
    EnProceso,
    Resuelto,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Pendiente, Status::EnProceso, Status::Resuelto];

    pub fn label(self) -> &'static str {
        match self {
            Status::Pendiente => "Pendiente",
            Status::EnProceso => "En Proceso",
            Status::Resuelto => "Resuelto",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match fold_label(raw).as_str() {
            "pendiente" | "pending" => Some(Status::Pendiente),
            "en proceso" | "enproceso" | "in progress" => Some(Status::EnProceso),
            "resuelto" | "resolved" => Some(Status::Resuelto),
            _ => None,
        }
    }

    /// Unknown values fall back to the initial state.
    pub fn coerce(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    pub fn is_resolved(self) -> bool {
        self == Status::Resuelto
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(lenient_label(deserializer)?
            .map(|raw| Self::coerce(&raw))
            .unwrap_or_default())
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        s.label().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn lenient_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn blank_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// The ticket entity. Field names on the wire follow the remote collection's schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub id: ReportId,
    #[serde(rename = "departamento")]
    pub departments: Departments,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "tipoProblema")]
    pub problem_type: String,
    #[serde(rename = "quienReporta")]
    pub reported_by: String,
    #[serde(rename = "prioridad", default)]
    pub priority: Priority,
    #[serde(rename = "estado", default)]
    pub status: Status,
    #[serde(rename = "asignadoA", default, deserialize_with = "blank_as_none")]
    pub assignee: Option<String>,
    #[serde(rename = "fechaHora", with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "adjuntos", default)]
    pub attachments: Vec<String>,
}

impl Report {
    pub fn assignee_label(&self) -> &str {
        self.assignee.as_deref().unwrap_or(UNASSIGNED_LABEL)
    }
}

/// Creation payload for `CREATE`; the server assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewReport {
    #[serde(rename = "departamento")]
    pub departments: Departments,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "tipoProblema")]
    pub problem_type: String,
    #[serde(rename = "quienReporta")]
    pub reported_by: String,
    #[serde(rename = "prioridad")]
    pub priority: Priority,
    #[serde(rename = "estado")]
    pub status: Status,
    #[serde(rename = "asignadoA")]
    pub assignee: Option<String>,
    #[serde(rename = "fechaHora", with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(rename = "adjuntos", default)]
    pub attachments: Vec<String>,
}

impl NewReport {
    pub fn into_report(self, id: ReportId) -> Report {
        Report {
            id,
            departments: self.departments,
            description: self.description,
            problem_type: self.problem_type,
            reported_by: self.reported_by,
            priority: self.priority,
            status: self.status,
            assignee: self.assignee,
            timestamp: self.timestamp,
            attachments: self.attachments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_and_coercion() {
        assert!(Priority::Baja < Priority::Media);
        assert!(Priority::Alta < Priority::Critica);
        assert_eq!(Priority::coerce("CRITICA"), Priority::Critica);
        assert_eq!(Priority::coerce(" crítica "), Priority::Critica);
        assert_eq!(Priority::coerce("urgente"), Priority::Baja);
    }

    #[test]
    fn status_coercion_accepts_loose_labels() {
        assert_eq!(Status::coerce("en_proceso"), Status::EnProceso);
        assert_eq!(Status::coerce("En   Proceso"), Status::EnProceso);
        assert_eq!(Status::coerce("cerrado"), Status::Pendiente);
    }

    #[test]
    fn report_decodes_wire_shape_with_coercions() {
        let json = r#"{
            "id": 42,
            "departamento": "Catastro, Obras",
            "descripcion": "La impresora del segundo piso no imprime",
            "tipoProblema": "Impresora",
            "quienReporta": "Ana",
            "prioridad": "Muy alta",
            "estado": "Resuelto",
            "asignadoA": "  ",
            "fechaHora": "2025-06-10T09:30:00Z"
        }"#;
        let r: Report = serde_json::from_str(json).expect("decode");
        assert_eq!(r.id.as_str(), "42");
        assert_eq!(r.departments.as_slice(), ["Catastro", "Obras"]);
        assert_eq!(r.priority, Priority::Baja);
        assert_eq!(r.status, Status::Resuelto);
        assert_eq!(r.assignee, None);
        assert_eq!(r.assignee_label(), UNASSIGNED_LABEL);
        assert!(r.attachments.is_empty());
    }

    #[test]
    fn non_text_enum_values_fall_back_to_defaults() {
        let base = |prioridad: &str, estado: &str| {
            format!(
                r#"{{"id": "9", "departamento": ["Catastro"], "descripcion": "Sin red en catastro",
                    "tipoProblema": "Red", "quienReporta": "Ana", "prioridad": {prioridad},
                    "estado": {estado}, "fechaHora": "2025-06-10T09:30:00Z"}}"#
            )
        };
        for (prioridad, estado) in [("null", "null"), ("3", "2"), ("[\"Alta\"]", "{}")] {
            let r: Report = serde_json::from_str(&base(prioridad, estado))
                .unwrap_or_else(|e| panic!("{prioridad}/{estado}: {e}"));
            assert_eq!((r.priority, r.status), (Priority::Baja, Status::Pendiente));
        }
        let r: Report = serde_json::from_str(&base("\"alta\"", "\"resuelto\"")).expect("text");
        assert_eq!((r.priority, r.status), (Priority::Alta, Status::Resuelto));
    }
}
