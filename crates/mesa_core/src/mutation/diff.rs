use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Departments, Priority, Report, Status};

/// Partial update sent with `PATCH`; only `Some` fields are serialized.
///
/// `assignee: Some(None)` clears the assignee (serialized as `null`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportPatch {
    #[serde(rename = "departamento", skip_serializing_if = "Option::is_none")]
    pub departments: Option<Departments>,
    #[serde(rename = "descripcion", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "tipoProblema", skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    #[serde(rename = "quienReporta", skip_serializing_if = "Option::is_none")]
    pub reported_by: Option<String>,
    #[serde(rename = "prioridad", skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(rename = "estado", skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(
        rename = "asignadoA",
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub assignee: Option<Option<String>>,
}

impl ReportPatch {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Wire names of the fields carried by this patch, in schema order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.departments.is_some() {
            out.push("departamento");
        }
        if self.description.is_some() {
            out.push("descripcion");
        }
        if self.problem_type.is_some() {
            out.push("tipoProblema");
        }
        if self.reported_by.is_some() {
            out.push("quienReporta");
        }
        if self.priority.is_some() {
            out.push("prioridad");
        }
        if self.status.is_some() {
            out.push("estado");
        }
        if self.assignee.is_some() {
            out.push("asignadoA");
        }
        out
    }

    /// Keep only the fields named in `fields` (wire names); the rest are dropped from the patch.
    pub fn restricted_to(mut self, fields: &BTreeSet<&'static str>) -> Self {
        let keep = |name: &str| fields.contains(name);
        if !keep("departamento") {
            self.departments = None;
        }
        if !keep("descripcion") {
            self.description = None;
        }
        if !keep("tipoProblema") {
            self.problem_type = None;
        }
        if !keep("quienReporta") {
            self.reported_by = None;
        }
        if !keep("prioridad") {
            self.priority = None;
        }
        if !keep("estado") {
            self.status = None;
        }
        if !keep("asignadoA") {
            self.assignee = None;
        }
        self
    }

    pub fn apply_to(&self, report: &mut Report) {
        if let Some(v) = &self.departments {
            report.departments = v.clone();
        }
        if let Some(v) = &self.description {
            report.description = v.clone();
        }
        if let Some(v) = &self.problem_type {
            report.problem_type = v.clone();
        }
        if let Some(v) = &self.reported_by {
            report.reported_by = v.clone();
        }
        if let Some(v) = self.priority {
            report.priority = v;
        }
        if let Some(v) = self.status {
            report.status = v;
        }
        if let Some(v) = &self.assignee {
            report.assignee = v.clone();
        }
    }
}

/// Fields that differ between `baseline` and `draft`. Departments compare as sets.
///
/// `id`, `timestamp` and `attachments` are never part of a patch.
pub fn compute_patch(baseline: &Report, draft: &Report) -> ReportPatch {
    let mut patch = ReportPatch::default();
    if !baseline.departments.same_members(&draft.departments) {
        patch.departments = Some(draft.departments.clone());
    }
    if baseline.description != draft.description {
        patch.description = Some(draft.description.clone());
    }
    if baseline.problem_type != draft.problem_type {
        patch.problem_type = Some(draft.problem_type.clone());
    }
    if baseline.reported_by != draft.reported_by {
        patch.reported_by = Some(draft.reported_by.clone());
    }
    if baseline.priority != draft.priority {
        patch.priority = Some(draft.priority);
    }
    if baseline.status != draft.status {
        patch.status = Some(draft.status);
    }
    if baseline.assignee != draft.assignee {
        patch.assignee = Some(draft.assignee.clone());
    }
    patch
}

/// One inline edit to the draft under an active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    /// Raw editor text; normalized like any other ingress. Blank input keeps the current value.
    Departments(String),
    Description(String),
    ProblemType(String),
    ReportedBy(String),
    Priority(Priority),
    Status(Status),
    /// `None` or blank text unassigns.
    Assignee(Option<String>),
}

impl FieldChange {
    /// Wire name of the field this change targets.
    pub fn field(&self) -> &'static str {
        match self {
            FieldChange::Departments(_) => "departamento",
            FieldChange::Description(_) => "descripcion",
            FieldChange::ProblemType(_) => "tipoProblema",
            FieldChange::ReportedBy(_) => "quienReporta",
            FieldChange::Priority(_) => "prioridad",
            FieldChange::Status(_) => "estado",
            FieldChange::Assignee(_) => "asignadoA",
        }
    }

    /// Apply to a draft. Returns `false` when the change was rejected by normalization.
    pub fn apply_to(&self, draft: &mut Report) -> bool {
        match self {
            FieldChange::Departments(raw) => match Departments::parse_text(raw) {
                Some(d) => draft.departments = d,
                None => return false,
            },
            FieldChange::Description(v) => draft.description = v.clone(),
            FieldChange::ProblemType(v) => draft.problem_type = v.clone(),
            FieldChange::ReportedBy(v) => draft.reported_by = v.clone(),
            FieldChange::Priority(v) => draft.priority = *v,
            FieldChange::Status(v) => draft.status = *v,
            FieldChange::Assignee(v) => {
                draft.assignee = v
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            }
        }
        true
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Option<String>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<String>>, D::Error> {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::sample_report;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_field_difference_yields_single_field_patch() {
        let baseline = sample_report("7", "2025-06-10T09:00:00Z");
        let mut draft = baseline.clone();
        draft.status = Status::Resuelto;

        let patch = compute_patch(&baseline, &draft);
        assert_eq!(
            patch,
            ReportPatch {
                status: Some(Status::Resuelto),
                ..ReportPatch::default()
            }
        );
        assert_eq!(
            serde_json::to_string(&patch).expect("encode"),
            r#"{"estado":"Resuelto"}"#
        );
    }

    #[test]
    fn department_reordering_is_not_a_change() {
        let mut baseline = sample_report("7", "2025-06-10T09:00:00Z");
        baseline.departments = Departments::parse_text("Catastro, Obras").expect("dept");
        let mut draft = baseline.clone();
        assert!(FieldChange::Departments("Obras ,Catastro".to_string()).apply_to(&mut draft));
        assert!(compute_patch(&baseline, &draft).is_empty());
    }

    #[test]
    fn clearing_assignee_serializes_null() {
        let mut baseline = sample_report("7", "2025-06-10T09:00:00Z");
        baseline.assignee = Some("Lucía Ramírez".to_string());
        let mut draft = baseline.clone();
        FieldChange::Assignee(Some("  ".to_string())).apply_to(&mut draft);

        let patch = compute_patch(&baseline, &draft);
        assert_eq!(patch.changed_fields(), ["asignadoA"]);
        assert_eq!(
            serde_json::to_string(&patch).expect("encode"),
            r#"{"asignadoA":null}"#
        );
    }

    #[test]
    fn restricting_drops_fields_outside_the_set() {
        let baseline = sample_report("7", "2025-06-10T09:00:00Z");
        let mut draft = baseline.clone();
        draft.priority = Priority::Alta;
        draft.status = Status::Resuelto;

        let touched: BTreeSet<&'static str> = [FieldChange::Priority(Priority::Alta).field()].into();
        let patch = compute_patch(&baseline, &draft).restricted_to(&touched);
        assert_eq!(patch.changed_fields(), ["prioridad"]);
    }

    #[test]
    fn blank_department_edit_is_rejected() {
        let mut draft = sample_report("7", "2025-06-10T09:00:00Z");
        let before = draft.clone();
        assert!(!FieldChange::Departments(" , ".to_string()).apply_to(&mut draft));
        assert_eq!(draft, before);
    }
}
