//! Binds the stateless client to a transport and a cookie jar.
//!
//! # Design
//! `Gateway` plays the part a browser plays for a web front-end: it sends
//! whatever `MedicineClient` builds and keeps the cookies the server hands
//! back. Each public method is one remote operation: build, execute,
//! absorb cookies, parse.

use tracing::{debug, warn};

use crate::client::MedicineClient;
use crate::cookies::{CookieJar, CSRF_COOKIE};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::types::{Acknowledgement, Credentials, Medicine, MedicineInput, Registration, User};

pub struct Gateway<T> {
    client: MedicineClient,
    cookies: CookieJar,
    transport: T,
}

impl<T: Transport> Gateway<T> {
    pub fn new(client: MedicineClient, transport: T) -> Self {
        Self {
            client,
            cookies: CookieJar::new(),
            transport,
        }
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn register(&mut self, input: &Registration) -> Result<Acknowledgement, ApiError> {
        let request = self.client.build_register(&self.cookies, input)?;
        let response = self.round_trip(request)?;
        self.client.parse_register(response)
    }

    pub fn login(&mut self, input: &Credentials) -> Result<User, ApiError> {
        let request = self.client.build_login(&self.cookies, input)?;
        let response = self.round_trip(request)?;
        self.client.parse_login(response)
    }

    pub fn logout(&mut self) -> Result<Acknowledgement, ApiError> {
        let request = self.client.build_logout(&self.cookies);
        let response = self.round_trip(request)?;
        self.client.parse_logout(response)
    }

    pub fn current_user(&mut self) -> Result<User, ApiError> {
        let request = self.client.build_current_user(&self.cookies);
        let response = self.round_trip(request)?;
        self.client.parse_current_user(response)
    }

    /// Ask the server to issue an anti-forgery cookie if none is held yet.
    pub fn prime_csrf(&mut self) -> Result<(), ApiError> {
        if self.cookies.get(CSRF_COOKIE).is_some() {
            return Ok(());
        }
        let request = self.client.build_csrf_token(&self.cookies);
        let response = self.round_trip(request)?;
        let token = self.client.parse_csrf_token(response)?;
        // Some servers only return the token in the body.
        if self.cookies.get(CSRF_COOKIE).is_none() {
            self.cookies.insert(CSRF_COOKIE, token);
        }
        Ok(())
    }

    pub fn list_medicines(&mut self) -> Result<Vec<Medicine>, ApiError> {
        let request = self.client.build_list_medicines(&self.cookies);
        let response = self.round_trip(request)?;
        self.client.parse_list_medicines(response)
    }

    pub fn get_medicine(&mut self, id: i64) -> Result<Medicine, ApiError> {
        let request = self.client.build_get_medicine(&self.cookies, id);
        let response = self.round_trip(request)?;
        self.client.parse_get_medicine(response)
    }

    pub fn add_medicine(&mut self, input: &MedicineInput) -> Result<Medicine, ApiError> {
        let request = self.client.build_add_medicine(&self.cookies, input)?;
        let response = self.round_trip(request)?;
        self.client.parse_add_medicine(response)
    }

    pub fn update_medicine(&mut self, id: i64, input: &MedicineInput) -> Result<Medicine, ApiError> {
        let request = self.client.build_update_medicine(&self.cookies, id, input)?;
        let response = self.round_trip(request)?;
        self.client.parse_update_medicine(response)
    }

    pub fn delete_medicine(&mut self, id: i64) -> Result<Acknowledgement, ApiError> {
        let request = self.client.build_delete_medicine(&self.cookies, id);
        let response = self.round_trip(request)?;
        self.client.parse_delete_medicine(response)
    }

    fn round_trip(&mut self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let method = request.method;
        let path = request.path.clone();
        debug!(%method, %path, "sending request");

        let response = self.transport.execute(request).inspect_err(|e| {
            warn!(%method, %path, error = %e, "transport failure");
        })?;

        self.cookies.absorb(&response);
        if response.is_success() {
            debug!(%method, %path, status = response.status, "request succeeded");
        } else {
            warn!(%method, %path, status = response.status, "request rejected");
        }
        Ok(response)
    }
}
