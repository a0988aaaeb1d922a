//! Wire DTOs for the medicine tracker API.
//!
//! # Design
//! These mirror the mock-server's JSON but are defined independently;
//! integration tests catch drift. Response envelopes (`{user}`,
//! `{medicine}`, `{medicines}`) are kept crate-private because callers only
//! ever want the payload inside them. Unknown fields are ignored so extra
//! server data does not break decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The authenticated identity tracked client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A user-owned medicine record. `id` and both timestamps are assigned by
/// the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Whether the record has been edited since creation.
    pub fn was_updated(&self) -> bool {
        self.updated_at != self.created_at
    }
}

/// Request payload for adding or replacing a medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicineInput {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
}

/// Request payload for `POST /auth/login/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Request payload for `POST /auth/register/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Body of responses whose payload the client does not act on (register,
/// logout, delete). Only the optional server message is kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MedicineEnvelope {
    pub medicine: Medicine,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MedicineListEnvelope {
    pub medicines: Vec<Medicine>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CsrfEnvelope {
    pub csrf_token: String,
}

/// Server timestamps. RFC 3339 is expected; a datetime without an offset or
/// a bare date is read as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("unrecognised timestamp `{raw}`")))
    }

    fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        for format in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}
