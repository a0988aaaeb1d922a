//! Local form checks that run before any network call.

use crate::types::{Credentials, MedicineInput, Registration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please fill in all fields")]
    MissingFields,

    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Raw login form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Raw signup form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Raw add/edit form input. Values are trimmed on validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedicineForm {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<Credentials, ValidationError> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(ValidationError::MissingFields);
        }
        Ok(Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

impl SignupForm {
    pub fn validate(&self) -> Result<Registration, ValidationError> {
        let fields = [&self.username, &self.email, &self.password, &self.confirm_password];
        if fields.iter().any(|f| f.is_empty()) {
            return Err(ValidationError::MissingFields);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(Registration {
            username: self.username.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            confirm_password: self.confirm_password.clone(),
        })
    }
}

impl MedicineForm {
    pub fn validate(&self) -> Result<MedicineInput, ValidationError> {
        let name = self.name.trim();
        let dosage = self.dosage.trim();
        let frequency = self.frequency.trim();
        if name.is_empty() || dosage.is_empty() || frequency.is_empty() {
            return Err(ValidationError::MissingFields);
        }
        Ok(MedicineInput {
            name: name.to_string(),
            dosage: dosage.to_string(),
            frequency: frequency.to_string(),
        })
    }
}
