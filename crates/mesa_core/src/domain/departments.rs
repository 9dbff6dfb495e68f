use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Canonical department list: trimmed, de-duplicated (first occurrence wins), never empty.
///
/// Remote payloads and import files carry either a comma-joined string or a list; both shapes are
/// normalized here so nothing past the ingress boundary sees the ambiguous form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DepartmentsInput", into = "Vec<String>")]
pub struct Departments(Vec<String>);

/// Wire shapes accepted for the department field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DepartmentsInput {
    List(Vec<String>),
    Text(String),
}

impl Departments {
    /// Normalize already-split items. Returns `None` when nothing survives trimming.
    pub fn from_items<I, S>(items: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for item in items {
            let v = item.as_ref().trim();
            if v.is_empty() || out.iter().any(|d| d == v) {
                continue;
            }
            out.push(v.to_string());
        }
        if out.is_empty() {
            None
        } else {
            Some(Self(out))
        }
    }

    /// Normalize a comma-joined string such as `"Tesorería, Catastro"`.
    pub fn parse_text(raw: &str) -> Option<Self> {
        Self::from_items(raw.split(','))
    }

    pub fn from_input(input: DepartmentsInput) -> Option<Self> {
        match input {
            DepartmentsInput::List(items) => Self::from_items(items),
            DepartmentsInput::Text(raw) => Self::parse_text(&raw),
        }
    }

    pub fn single(name: &str) -> Option<Self> {
        Self::from_items([name])
    }

    /// Fixture constructor; callers pass a non-blank literal.
    pub(crate) fn from_static(name: &'static str) -> Self {
        Self(vec![name.trim().to_string()])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|d| d == name)
    }

    /// Display/export form, joined with `", "`.
    pub fn joined(&self) -> String {
        self.0.join(", ")
    }

    /// Order-insensitive comparison.
    pub fn same_members(&self, other: &Departments) -> bool {
        let a: BTreeSet<&str> = self.0.iter().map(String::as_str).collect();
        let b: BTreeSet<&str> = other.0.iter().map(String::as_str).collect();
        a == b
    }
}

impl TryFrom<DepartmentsInput> for Departments {
    type Error = String;

    fn try_from(input: DepartmentsInput) -> Result<Self, Self::Error> {
        Self::from_input(input).ok_or_else(|| "department list must not be empty".to_string())
    }
}

impl From<Departments> for Vec<String> {
    fn from(d: Departments) -> Self {
        d.0
    }
}

impl<'a> IntoIterator for &'a Departments {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
