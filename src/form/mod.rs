use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    GradeSections, Keyed, Machine, MachineStatus, RecordId, Role, ServiceType, Student, Teacher,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required field '{name}' is empty")]
    MissingField { name: &'static str },

    #[error("invalid email address")]
    InvalidEmail,

    #[error("selected section does not belong to the selected grade level")]
    SectionMismatch,

    #[error("captured rfid and fingerprint id are required for new registrations")]
    MissingBiometric,

    #[error("a submit is already in flight")]
    AlreadySubmitting,
}

fn email_ok(value: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
    });
    re.is_match(value)
}

fn require(name: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField { name })
    } else {
        Ok(())
    }
}

fn captured(value: &Option<String>) -> bool {
    !value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(RecordId),
}

/// An in-progress create/edit payload. Validation is a pure predicate
/// over the draft; nothing is sent to the server while it fails.
pub trait FormDraft: Default + Clone + Serialize {
    type Context;

    fn validate(&self, mode: FormMode, ctx: &Self::Context) -> Result<(), ValidationError>;
}

/// A record kind that can be loaded back into its draft for editing.
pub trait Draftable: Keyed {
    type Draft: FormDraft;

    fn to_draft(&self) -> Self::Draft;
}

/// Create ⇄ Edit ⇄ Submitting. Successful submit and cancel both fall
/// back to a cleared Create; a failed submit leaves mode and draft
/// untouched so the user can retry.
#[derive(Clone, Debug)]
pub struct FormState<D: FormDraft> {
    mode: FormMode,
    submitting: bool,
    draft: D,
}

impl<D: FormDraft> Default for FormState<D> {
    fn default() -> Self {
        Self {
            mode: FormMode::Create,
            submitting: false,
            draft: D::default(),
        }
    }
}

impl<D: FormDraft> FormState<D> {
    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut D {
        &mut self.draft
    }

    pub fn is_valid(&self, ctx: &D::Context) -> bool {
        self.draft.validate(self.mode, ctx).is_ok()
    }

    /// Prefills the draft from an existing record.
    pub fn begin_edit(&mut self, id: RecordId, draft: D) {
        if self.submitting {
            return;
        }
        self.mode = FormMode::Edit(id);
        self.draft = draft;
    }

    /// Explicit cancel: back to an empty Create without touching the
    /// server.
    pub fn cancel(&mut self) {
        if self.submitting {
            return;
        }
        self.mode = FormMode::Create;
        self.draft = D::default();
    }

    /// Validates and, on success, locks the form and hands back the
    /// wire payload (with the record id injected in edit mode).
    pub fn begin_submit(
        &mut self,
        ctx: &D::Context,
    ) -> Result<serde_json::Value, ValidationError> {
        if self.submitting {
            return Err(ValidationError::AlreadySubmitting);
        }
        self.draft.validate(self.mode, ctx)?;
        let mut payload = serde_json::to_value(&self.draft)
            .unwrap_or(serde_json::Value::Null);
        if let FormMode::Edit(id) = self.mode {
            if let Some(map) = payload.as_object_mut() {
                map.insert("id".to_string(), serde_json::json!(id.0));
            }
        }
        self.submitting = true;
        Ok(payload)
    }

    /// Unlocks the form. Success resets to a cleared Create; failure
    /// restores the previous state unchanged.
    pub fn finish_submit(&mut self, success: bool) {
        self.submitting = false;
        if success {
            self.mode = FormMode::Create;
            self.draft = D::default();
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StudentDraft {
    pub name: String,
    pub email: String,
    #[serde(rename = "gradeLevel")]
    pub grade_level: String,
    pub section: String,
    pub rfid: Option<String>,
    pub fingerprint_id: Option<String>,
}

impl FormDraft for StudentDraft {
    type Context = GradeSections;

    fn validate(&self, mode: FormMode, ctx: &Self::Context) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("email", &self.email)?;
        require("gradeLevel", &self.grade_level)?;
        require("section", &self.section)?;
        if !email_ok(self.email.trim()) {
            return Err(ValidationError::InvalidEmail);
        }
        if !ctx.section_belongs_to_grade(&self.grade_level, &self.section) {
            return Err(ValidationError::SectionMismatch);
        }
        // editing an existing student never forces re-capture; a new
        // registration needs both halves of the capture
        if mode == FormMode::Create && !(captured(&self.rfid) && captured(&self.fingerprint_id)) {
            return Err(ValidationError::MissingBiometric);
        }
        Ok(())
    }
}

impl Draftable for Student {
    type Draft = StudentDraft;

    fn to_draft(&self) -> StudentDraft {
        StudentDraft {
            name: self.name.clone(),
            email: self.email.clone(),
            grade_level: self.grade_level.clone(),
            section: self.section.clone(),
            rfid: self.rfid.clone(),
            fingerprint_id: self.fingerprint_id.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TeacherDraft {
    pub name: String,
    pub email: String,
    pub role: Option<Role>,
    pub rfid: Option<String>,
    pub fingerprint_id: Option<String>,
}

impl FormDraft for TeacherDraft {
    type Context = ();

    fn validate(&self, mode: FormMode, _ctx: &Self::Context) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("email", &self.email)?;
        if self.role.is_none() {
            return Err(ValidationError::MissingField { name: "role" });
        }
        if !email_ok(self.email.trim()) {
            return Err(ValidationError::InvalidEmail);
        }
        if mode == FormMode::Create && !(captured(&self.rfid) && captured(&self.fingerprint_id)) {
            return Err(ValidationError::MissingBiometric);
        }
        Ok(())
    }
}

impl Draftable for Teacher {
    type Draft = TeacherDraft;

    fn to_draft(&self) -> TeacherDraft {
        TeacherDraft {
            name: self.name.clone(),
            email: self.email.clone(),
            role: Some(self.role),
            rfid: self.rfid.clone(),
            fingerprint_id: self.fingerprint_id.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct MachineDraft {
    pub machine_id: Option<i64>,
    pub name: String,
    pub location: String,
    pub status: Option<MachineStatus>,
    pub service_type: Option<ServiceType>,
}

impl FormDraft for MachineDraft {
    type Context = ();

    fn validate(&self, _mode: FormMode, _ctx: &Self::Context) -> Result<(), ValidationError> {
        if self.machine_id.is_none() {
            return Err(ValidationError::MissingField { name: "machine_id" });
        }
        require("name", &self.name)?;
        require("location", &self.location)?;
        if self.status.is_none() {
            return Err(ValidationError::MissingField { name: "status" });
        }
        if self.service_type.is_none() {
            return Err(ValidationError::MissingField {
                name: "service_type",
            });
        }
        Ok(())
    }
}

impl Draftable for Machine {
    type Draft = MachineDraft;

    fn to_draft(&self) -> MachineDraft {
        MachineDraft {
            machine_id: Some(self.machine_id.0),
            name: self.name.clone(),
            location: self.location.clone(),
            status: Some(self.status),
            service_type: Some(self.service_type),
        }
    }
}
