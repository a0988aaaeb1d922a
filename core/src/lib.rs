//! Client core for the personal medicine tracker service.
//!
//! # Overview
//! Two layers. `MedicineClient` builds `HttpRequest` values and parses
//! `HttpResponse` values without touching the network (host-does-IO).
//! `Controller` sits on top: it owns the session and the cached medicine
//! list, runs one flow per user action through a `Gateway`, and reports to
//! a `View`.
//!
//! # Design
//! - `MedicineClient` is stateless; credentials come from a `CookieJar`.
//! - `Transport` is the only I/O seam. Hosts plug in a real HTTP agent,
//!   tests plug in scripted responses.
//! - DTOs are defined independently from the mock-server crate; the
//!   integration tests catch schema drift.

pub mod client;
pub mod config;
pub mod controller;
pub mod cookies;
pub mod error;
pub mod gateway;
pub mod http;
pub mod state;
pub mod transport;
pub mod types;
pub mod validate;

pub use client::MedicineClient;
pub use config::ClientConfig;
pub use controller::{Controller, FlowError, View};
pub use cookies::CookieJar;
pub use error::ApiError;
pub use gateway::Gateway;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use state::{AppState, Notice, NoticeLevel, Page};
pub use transport::Transport;
pub use types::{Acknowledgement, Credentials, Medicine, MedicineInput, Registration, User};
pub use validate::{LoginForm, MedicineForm, SignupForm, ValidationError};
