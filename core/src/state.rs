//! In-memory application state owned by the controller.
//!
//! # Design
//! `AppState` is the view-model handed to the renderer: the current
//! session, the cached medicine list, the pending-edit marker and the page
//! being shown. The cache is a disposable copy of server state; the
//! reconciliation methods here are the only way it changes, and together
//! they keep at most one entry per id.

use crate::types::{Medicine, User};
use crate::validate::MedicineForm;

/// Named view containers the renderer can show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Page {
    #[default]
    Home,
    Login,
    Signup,
    Dashboard,
    MedicineForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient notification for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    session: Option<User>,
    medicines: Vec<Medicine>,
    pending_edit: Option<Medicine>,
    page: Page,
}

impl AppState {
    pub fn session(&self) -> Option<&User> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn medicines(&self) -> &[Medicine] {
        &self.medicines
    }

    pub fn medicine(&self, id: i64) -> Option<&Medicine> {
        self.medicines.iter().find(|m| m.id == id)
    }

    pub fn pending_edit(&self) -> Option<&Medicine> {
        self.pending_edit.as_ref()
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Prefill for the add/edit form: the edited record's fields, or blanks.
    pub fn form_values(&self) -> MedicineForm {
        match &self.pending_edit {
            Some(m) => MedicineForm {
                name: m.name.clone(),
                dosage: m.dosage.clone(),
                frequency: m.frequency.clone(),
            },
            None => MedicineForm::default(),
        }
    }

    pub(crate) fn sign_in(&mut self, user: User) {
        self.session = Some(user);
    }

    /// Drop the session and everything derived from it.
    pub(crate) fn sign_out(&mut self) {
        self.session = None;
        self.medicines.clear();
        self.pending_edit = None;
    }

    pub(crate) fn set_page(&mut self, page: Page) {
        self.page = page;
    }

    pub(crate) fn set_pending_edit(&mut self, medicine: Option<Medicine>) {
        self.pending_edit = medicine;
    }

    /// Replace the cache with a fresh server listing, keeping server order.
    /// Duplicate ids keep their first occurrence.
    pub(crate) fn replace_medicines(&mut self, medicines: Vec<Medicine>) {
        let mut seen = std::collections::HashSet::new();
        self.medicines = medicines.into_iter().filter(|m| seen.insert(m.id)).collect();
    }

    /// Append a newly created record. An id already in the cache is
    /// replaced in place instead.
    pub(crate) fn append_medicine(&mut self, medicine: Medicine) {
        if !self.replace_medicine(medicine.clone()) {
            self.medicines.push(medicine);
        }
    }

    /// Swap in the server's copy of an existing record. Returns `false` and
    /// leaves the cache alone when the id is not cached.
    pub(crate) fn replace_medicine(&mut self, medicine: Medicine) -> bool {
        match self.medicines.iter_mut().find(|m| m.id == medicine.id) {
            Some(slot) => {
                *slot = medicine;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_medicine(&mut self, id: i64) {
        self.medicines.retain(|m| m.id != id);
    }
}
