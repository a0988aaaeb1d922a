//! User-action entry points driving the session and the medicine cache.
//!
//! # Design
//! `Controller` owns the `AppState` and is the only thing that mutates it.
//! Every entry point takes `&mut self`, so one flow runs to completion
//! before the next starts. Flows validate locally first, then call the
//! `Gateway`, reconcile state from whatever the server returned, and tell
//! the `View` what to show. Remote failures leave the session and cache as
//! they were, with one decided exception noted on `logout`.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::state::{AppState, Notice, Page};
use crate::transport::Transport;
use crate::validate::{LoginForm, MedicineForm, SignupForm, ValidationError};

/// Prompt passed to [`View::confirm`] before deleting.
pub const DELETE_PROMPT: &str = "Are you sure you want to delete this medicine?";

/// The rendering collaborator.
pub trait View {
    /// Switch to `page`. `state` is the model at the time of the switch.
    fn show_page(&mut self, page: Page, state: &AppState);

    /// Switch to `page` once `delay` has passed.
    fn show_page_after(&mut self, page: Page, delay: Duration);

    /// Redraw whatever depends on the session or the medicine list.
    fn render(&mut self, state: &AppState);

    fn notify(&mut self, notice: Notice);

    fn set_busy(&mut self, busy: bool);

    /// Ask the user a yes/no question.
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Why a flow did not complete. The view has already been told.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("no medicine with id {0} in the current list")]
    UnknownMedicine(i64),
}

pub struct Controller<T, V> {
    gateway: Gateway<T>,
    view: V,
    state: AppState,
    config: ClientConfig,
    busy_depth: usize,
}

impl<T: Transport, V: View> Controller<T, V> {
    pub fn new(gateway: Gateway<T>, view: V, config: ClientConfig) -> Self {
        Self {
            gateway,
            view,
            state: AppState::default(),
            config,
            busy_depth: 0,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn gateway(&self) -> &Gateway<T> {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut Gateway<T> {
        &mut self.gateway
    }

    // --- session flows ---

    /// Probe for an existing server session and land on the matching page.
    pub fn start(&mut self) -> Result<(), FlowError> {
        self.busy(|this| match this.gateway.current_user() {
            Ok(user) => {
                info!(user = %user.username, "resumed existing session");
                this.state.sign_in(user);
                this.view.render(&this.state);
                this.enter_dashboard();
                Ok(())
            }
            Err(err) => {
                debug!(error = %err, "no active session");
                this.state.sign_out();
                this.view.render(&this.state);
                this.navigate(Page::Home);
                Ok(())
            }
        })
    }

    pub fn submit_login(&mut self, form: &LoginForm) -> Result<(), FlowError> {
        let credentials = form.validate().map_err(|e| self.reject(e))?;

        self.busy(|this| match this.gateway.login(&credentials) {
            Ok(user) => {
                info!(user = %user.username, "signed in");
                this.state.sign_in(user);
                this.notify(Notice::success("Login successful!"));
                this.view.render(&this.state);
                this.enter_dashboard();
                Ok(())
            }
            Err(err) => {
                let message = err.message();
                Err(this.fail(err, message))
            }
        })
    }

    pub fn submit_signup(&mut self, form: &SignupForm) -> Result<(), FlowError> {
        let registration = form.validate().map_err(|e| self.reject(e))?;

        self.busy(|this| match this.gateway.register(&registration) {
            Ok(_) => {
                info!(user = %registration.username, "account created");
                this.notify(Notice::success("Account created successfully! Please log in."));
                this.navigate(Page::Login);
                Ok(())
            }
            Err(err) => {
                let message = err.message();
                Err(this.fail(err, message))
            }
        })
    }

    /// End the session. On failure the local session is kept, since the
    /// server-side session most likely still exists.
    pub fn logout(&mut self) -> Result<(), FlowError> {
        self.busy(|this| match this.gateway.logout() {
            Ok(_) => {
                info!("signed out");
                this.state.sign_out();
                this.state.set_page(Page::Home);
                this.view.render(&this.state);
                this.notify(Notice::success("Logged out successfully"));
                this.view
                    .show_page_after(Page::Home, this.config.logout_redirect_delay());
                Ok(())
            }
            Err(err) => {
                let message = format!("Logout failed: {}", err.message());
                Err(this.fail(err, message))
            }
        })
    }

    // --- navigation ---

    pub fn show_home(&mut self) {
        self.navigate(Page::Home);
    }

    pub fn show_login(&mut self) {
        self.navigate(Page::Login);
    }

    pub fn show_signup(&mut self) {
        self.navigate(Page::Signup);
    }

    /// Enter the dashboard and refresh the list. Anonymous users are sent
    /// to the login page instead.
    pub fn show_dashboard(&mut self) -> Result<(), FlowError> {
        if !self.state.is_authenticated() {
            self.navigate(Page::Login);
            return Ok(());
        }
        self.navigate(Page::Dashboard);
        self.load_medicines()
    }

    // --- medicine flows ---

    pub fn load_medicines(&mut self) -> Result<(), FlowError> {
        self.busy(|this| match this.gateway.list_medicines() {
            Ok(medicines) => {
                debug!(count = medicines.len(), "loaded medicines");
                this.state.replace_medicines(medicines);
                this.view.render(&this.state);
                Ok(())
            }
            Err(err) => Err(this.fail(err, "Failed to load medicines".to_string())),
        })
    }

    pub fn begin_add(&mut self) {
        self.state.set_pending_edit(None);
        self.navigate(Page::MedicineForm);
    }

    pub fn begin_edit(&mut self, id: i64) -> Result<(), FlowError> {
        let Some(medicine) = self.state.medicine(id).cloned() else {
            self.notify(Notice::error("Medicine not found"));
            return Err(FlowError::UnknownMedicine(id));
        };
        self.state.set_pending_edit(Some(medicine));
        self.navigate(Page::MedicineForm);
        Ok(())
    }

    /// Submit the add/edit form: update when a record is being edited,
    /// create otherwise. On success the cache is reconciled with the saved
    /// record and the dashboard is entered, which reloads the list.
    pub fn save_medicine(&mut self, form: &MedicineForm) -> Result<(), FlowError> {
        let input = form.validate().map_err(|e| self.reject(e))?;
        let editing = self.state.pending_edit().map(|m| m.id);

        self.busy(|this| {
            let saved = match editing {
                Some(id) => this.gateway.update_medicine(id, &input),
                None => this.gateway.add_medicine(&input),
            };
            let medicine = match saved {
                Ok(medicine) => medicine,
                Err(err) => {
                    let message = err.message();
                    return Err(this.fail(err, message));
                }
            };

            let message = if editing.is_some() {
                if !this.state.replace_medicine(medicine) {
                    debug!(id = ?editing, "updated medicine is not in the cached list");
                }
                "Medicine updated successfully!"
            } else {
                this.state.append_medicine(medicine);
                "Medicine added successfully!"
            };

            this.state.set_pending_edit(None);
            this.notify(Notice::success(message));
            this.enter_dashboard();
            Ok(())
        })
    }

    /// Delete after the user confirms. Declining is not an error.
    pub fn delete_medicine(&mut self, id: i64) -> Result<(), FlowError> {
        if !self.view.confirm(DELETE_PROMPT) {
            debug!(id, "delete cancelled");
            return Ok(());
        }

        self.busy(|this| match this.gateway.delete_medicine(id) {
            Ok(_) => {
                this.state.remove_medicine(id);
                if this.state.pending_edit().is_some_and(|m| m.id == id) {
                    this.state.set_pending_edit(None);
                }
                this.view.render(&this.state);
                this.notify(Notice::success("Medicine deleted successfully!"));
                Ok(())
            }
            Err(err) => {
                let message = format!("Failed to delete medicine: {}", err.message());
                Err(this.fail(err, message))
            }
        })
    }

    // --- helpers ---

    /// Show the busy indicator for the duration of `flow`. Nested scopes
    /// toggle it only at the outermost level.
    fn busy<R>(&mut self, flow: impl FnOnce(&mut Self) -> R) -> R {
        if self.busy_depth == 0 {
            self.view.set_busy(true);
        }
        self.busy_depth += 1;
        let out = flow(self);
        self.busy_depth -= 1;
        if self.busy_depth == 0 {
            self.view.set_busy(false);
        }
        out
    }

    /// Enter the dashboard after a flow that already succeeded. A failed
    /// reload has been reported through the view and does not undo it.
    fn enter_dashboard(&mut self) {
        if let Err(err) = self.show_dashboard() {
            debug!(error = %err, "dashboard reload failed");
        }
    }

    fn navigate(&mut self, page: Page) {
        self.state.set_page(page);
        self.view.show_page(page, &self.state);
    }

    fn notify(&mut self, notice: Notice) {
        self.view.notify(notice);
    }

    fn reject(&mut self, err: ValidationError) -> FlowError {
        debug!(error = %err, "form rejected");
        self.notify(Notice::error(err.to_string()));
        FlowError::Invalid(err)
    }

    fn fail(&mut self, err: ApiError, message: String) -> FlowError {
        self.notify(Notice::error(message));
        FlowError::Api(err)
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
