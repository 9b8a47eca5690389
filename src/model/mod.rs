use std::fmt;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};

/// One CRUD-able list category exposed by the API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    Student,
    Teacher,
    Machine,
    Entry,
}

impl ResourceKind {
    pub fn singular(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Machine => "machine",
            Self::Entry => "entry",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            Self::Student => "students",
            Self::Teacher => "teachers",
            Self::Machine => "machines",
            Self::Entry => "entries",
        }
    }

    /// Key holding the record array inside the list envelope.
    pub fn items_key(&self) -> &'static str {
        self.plural()
    }

    pub fn list_path(&self) -> String {
        match self {
            // entries are served from a dedicated read-only route
            Self::Entry => "entry/list".to_string(),
            _ => self.plural().to_string(),
        }
    }

    pub fn register_path(&self) -> String {
        format!("{}/register", self.plural())
    }

    pub fn update_path(&self) -> String {
        format!("{}/update", self.plural())
    }

    pub fn delete_path(&self, id: RecordId) -> String {
        format!("{}/delete/{}", self.plural(), id)
    }

    pub fn bulk_delete_path(&self) -> String {
        format!("{}/bulk-delete", self.plural())
    }
}

/// Normalized record identifier. The server is inconsistent about id
/// typing (sometimes a JSON number, sometimes a string holding one),
/// so ids are parsed exactly once on receipt and compared as integers
/// from then on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(RecordId)
                .ok_or_else(|| de::Error::custom("record id is not an integer")),
            serde_json::Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(RecordId)
                .map_err(|_| de::Error::custom(format!("invalid record id '{s}'"))),
            other => Err(de::Error::custom(format!(
                "record id must be a number or string, got {other}"
            ))),
        }
    }
}

/// One rendered table cell. Badge cells get the deterministic
/// label-to-color treatment when printed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub badge: bool,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            badge: false,
        }
    }

    pub fn badge(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            badge: true,
        }
    }
}

/// A record that can appear in a paginated list view.
pub trait ListRecord: DeserializeOwned + Serialize + Clone {
    const KIND: ResourceKind;

    fn columns() -> &'static [&'static str];
    fn row(&self) -> Vec<Cell>;
}

/// A record with a stable identity, i.e. one that supports edit,
/// delete and selection. Attendance entries deliberately do not
/// implement this: they are server-computed and read-only.
pub trait Keyed: ListRecord {
    fn id(&self) -> RecordId;

    /// Human-facing name used in notifications.
    fn label(&self) -> &str;
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Student {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    #[serde(rename = "gradeLevel")]
    pub grade_level: String,
    pub section: String,
    #[serde(default)]
    pub rfid: Option<String>,
    #[serde(default)]
    pub fingerprint_id: Option<String>,
}

impl ListRecord for Student {
    const KIND: ResourceKind = ResourceKind::Student;

    fn columns() -> &'static [&'static str] {
        &["Id", "Name", "Email", "Grade", "Section"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::plain(self.id.to_string()),
            Cell::plain(&self.name),
            Cell::plain(&self.email),
            Cell::plain(&self.grade_level),
            Cell::plain(&self.section),
        ]
    }
}

impl Keyed for Student {
    fn id(&self) -> RecordId {
        self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Role {
    Admin,
    #[serde(rename = "Co-Admin")]
    CoAdmin,
    Teacher,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "co-admin" | "coadmin" => Some(Self::CoAdmin),
            "teacher" => Some(Self::Teacher),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::CoAdmin => "Co-Admin",
            Self::Teacher => "Teacher",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Teacher {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub rfid: Option<String>,
    #[serde(default)]
    pub fingerprint_id: Option<String>,
}

impl ListRecord for Teacher {
    const KIND: ResourceKind = ResourceKind::Teacher;

    fn columns() -> &'static [&'static str] {
        &["Id", "Name", "Email", "Role"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::plain(self.id.to_string()),
            Cell::plain(&self.name),
            Cell::plain(&self.email),
            Cell::badge(self.role.as_str()),
        ]
    }
}

impl Keyed for Teacher {
    fn id(&self) -> RecordId {
        self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum MachineStatus {
    Active,
    Inactive,
}

impl MachineStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ServiceType {
    Monitor,
    Enroll,
}

impl ServiceType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "monitor" => Some(Self::Monitor),
            "enroll" => Some(Self::Enroll),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monitor => "Monitor",
            Self::Enroll => "Enroll",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Machine {
    pub machine_id: RecordId,
    pub name: String,
    pub location: String,
    pub status: MachineStatus,
    pub service_type: ServiceType,
}

impl ListRecord for Machine {
    const KIND: ResourceKind = ResourceKind::Machine;

    fn columns() -> &'static [&'static str] {
        &["Machine", "Name", "Location", "Status", "Service"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::plain(self.machine_id.to_string()),
            Cell::plain(&self.name),
            Cell::plain(&self.location),
            Cell::badge(self.status.as_str()),
            Cell::plain(self.service_type.as_str()),
        ]
    }
}

impl Keyed for Machine {
    fn id(&self) -> RecordId {
        self.machine_id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum EntryStatus {
    #[serde(rename = "On Time")]
    OnTime,
    Late,
    Absent,
    Present,
}

impl EntryStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "on time" => Some(Self::OnTime),
            "late" => Some(Self::Late),
            "absent" => Some(Self::Absent),
            "present" => Some(Self::Present),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnTime => "On Time",
            Self::Late => "Late",
            Self::Absent => "Absent",
            Self::Present => "Present",
        }
    }
}

/// A server-computed attendance entry. No id, no mutations.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Entry {
    pub name: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub status: Option<EntryStatus>,
}

impl ListRecord for Entry {
    const KIND: ResourceKind = ResourceKind::Entry;

    fn columns() -> &'static [&'static str] {
        &["Name", "Time", "Status"]
    }

    fn row(&self) -> Vec<Cell> {
        vec![
            Cell::plain(&self.name),
            Cell::plain(self.time.as_deref().unwrap_or("N/A")),
            Cell::badge(self.status.map(|s| s.as_str()).unwrap_or("N/A")),
        ]
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Grade {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Section {
    pub id: String,
    #[serde(rename = "gradeId")]
    pub grade_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Grade/section lookup used by the student form's referential check.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GradeSections {
    pub grades: Vec<Grade>,
    pub sections: Vec<Section>,
}

impl GradeSections {
    /// True when `section` exists and belongs to `grade`.
    pub fn section_belongs_to_grade(&self, grade: &str, section: &str) -> bool {
        self.sections
            .iter()
            .any(|s| s.id == section && s.grade_id == grade)
    }

    pub fn sections_for_grade(&self, grade: &str) -> Vec<&Section> {
        self.sections
            .iter()
            .filter(|s| s.grade_id == grade)
            .collect()
    }
}
