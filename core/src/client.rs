//! Stateless HTTP request builder and response parser for the medicine
//! tracker API.
//!
//! # Design
//! `MedicineClient` holds only a `base_url`. Each remote operation is split
//! into a `build_*` method that produces an `HttpRequest` and a `parse_*`
//! method that consumes an `HttpResponse`; the transport in between is
//! someone else's job. Credentials come from the `CookieJar` passed to each
//! `build_*` call, so the client itself never mutates shared state.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cookies::{CookieJar, CSRF_COOKIE};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    Acknowledgement, Credentials, CsrfEnvelope, Medicine, MedicineEnvelope, MedicineInput,
    MedicineListEnvelope, Registration, User, UserEnvelope,
};

/// Anti-forgery header, populated from the [`CSRF_COOKIE`] cookie.
pub const CSRF_HEADER: &str = "x-csrftoken";

/// Synchronous, stateless client for the medicine tracker API.
#[derive(Debug, Clone)]
pub struct MedicineClient {
    base_url: String,
}

impl MedicineClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --- auth ---

    pub fn build_register(&self, jar: &CookieJar, input: &Registration) -> Result<HttpRequest, ApiError> {
        self.request_with_body(HttpMethod::Post, "/auth/register/", jar, input)
    }

    pub fn build_login(&self, jar: &CookieJar, input: &Credentials) -> Result<HttpRequest, ApiError> {
        self.request_with_body(HttpMethod::Post, "/auth/login/", jar, input)
    }

    pub fn build_logout(&self, jar: &CookieJar) -> HttpRequest {
        self.request(HttpMethod::Post, "/auth/logout/", jar)
    }

    pub fn build_current_user(&self, jar: &CookieJar) -> HttpRequest {
        self.request(HttpMethod::Get, "/auth/me/", jar)
    }

    pub fn build_csrf_token(&self, jar: &CookieJar) -> HttpRequest {
        self.request(HttpMethod::Get, "/auth/csrf/", jar)
    }

    // --- medicines ---

    pub fn build_list_medicines(&self, jar: &CookieJar) -> HttpRequest {
        self.request(HttpMethod::Get, "/medicines/", jar)
    }

    pub fn build_get_medicine(&self, jar: &CookieJar, id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/medicines/{id}/"), jar)
    }

    pub fn build_add_medicine(&self, jar: &CookieJar, input: &MedicineInput) -> Result<HttpRequest, ApiError> {
        self.request_with_body(HttpMethod::Post, "/medicines/", jar, input)
    }

    pub fn build_update_medicine(
        &self,
        jar: &CookieJar,
        id: i64,
        input: &MedicineInput,
    ) -> Result<HttpRequest, ApiError> {
        self.request_with_body(HttpMethod::Put, &format!("/medicines/{id}/"), jar, input)
    }

    pub fn build_delete_medicine(&self, jar: &CookieJar, id: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/medicines/{id}/"), jar)
    }

    // --- parsing ---

    pub fn parse_register(&self, response: HttpResponse) -> Result<Acknowledgement, ApiError> {
        decode_acknowledgement(response)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<User, ApiError> {
        decode::<UserEnvelope>(response).map(|e| e.user)
    }

    pub fn parse_logout(&self, response: HttpResponse) -> Result<Acknowledgement, ApiError> {
        decode_acknowledgement(response)
    }

    pub fn parse_current_user(&self, response: HttpResponse) -> Result<User, ApiError> {
        decode::<UserEnvelope>(response).map(|e| e.user)
    }

    pub fn parse_csrf_token(&self, response: HttpResponse) -> Result<String, ApiError> {
        decode::<CsrfEnvelope>(response).map(|e| e.csrf_token)
    }

    pub fn parse_list_medicines(&self, response: HttpResponse) -> Result<Vec<Medicine>, ApiError> {
        decode::<MedicineListEnvelope>(response).map(|e| e.medicines)
    }

    pub fn parse_get_medicine(&self, response: HttpResponse) -> Result<Medicine, ApiError> {
        decode::<MedicineEnvelope>(response).map(|e| e.medicine)
    }

    pub fn parse_add_medicine(&self, response: HttpResponse) -> Result<Medicine, ApiError> {
        decode::<MedicineEnvelope>(response).map(|e| e.medicine)
    }

    pub fn parse_update_medicine(&self, response: HttpResponse) -> Result<Medicine, ApiError> {
        decode::<MedicineEnvelope>(response).map(|e| e.medicine)
    }

    pub fn parse_delete_medicine(&self, response: HttpResponse) -> Result<Acknowledgement, ApiError> {
        decode_acknowledgement(response)
    }

    /// Every request carries the JSON content type, the anti-forgery header
    /// and, when the jar holds anything, the cookie header.
    fn request(&self, method: HttpMethod, resource: &str, jar: &CookieJar) -> HttpRequest {
        let mut headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            (
                CSRF_HEADER.to_string(),
                jar.get(CSRF_COOKIE).unwrap_or_default().to_string(),
            ),
        ];
        if let Some(cookie) = jar.header_value() {
            headers.push(("cookie".to_string(), cookie));
        }
        HttpRequest {
            method,
            path: format!("{}{resource}", self.base_url),
            headers,
            body: None,
        }
    }

    fn request_with_body<B: Serialize>(
        &self,
        method: HttpMethod,
        resource: &str,
        jar: &CookieJar,
        input: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut request = self.request(method, resource, jar);
        request.body = Some(body);
        Ok(request)
    }
}

/// Any 2xx is success; everything else becomes `ApiError::Rejected`.
fn decode<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    if !response.is_success() {
        return Err(ApiError::from_failure(&response));
    }
    serde_json::from_str(&response.body).map_err(|e| ApiError::Malformed(e.to_string()))
}

/// Like `decode`, but an empty 2xx body (e.g. 204) is a valid acknowledgement.
fn decode_acknowledgement(response: HttpResponse) -> Result<Acknowledgement, ApiError> {
    if response.is_success() && response.body.trim().is_empty() {
        return Ok(Acknowledgement::default());
    }
    decode(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEDICINE_JSON: &str = r#"{"id":7,"name":"Aspirin","dosage":"500mg","frequency":"daily","created_at":"2024-03-01T09:00:00Z","updated_at":"2024-03-01T09:00:00Z"}"#;

    fn client() -> MedicineClient {
        MedicineClient::new("http://localhost:8000/api")
    }

    fn signed_in_jar() -> CookieJar {
        let mut jar = CookieJar::new();
        jar.insert("csrftoken", "tok");
        jar.insert("sessionid", "sid");
        jar
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn aspirin() -> MedicineInput {
        MedicineInput {
            name: "Aspirin".to_string(),
            dosage: "500mg".to_string(),
            frequency: "daily".to_string(),
        }
    }

    #[test]
    fn build_list_medicines_produces_correct_request() {
        let req = client().build_list_medicines(&CookieJar::new());
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:8000/api/medicines/");
        assert!(req.body.is_none());
        assert_eq!(
            req.headers,
            vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("x-csrftoken".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn requests_carry_cookies_and_csrf_token() {
        let req = client().build_current_user(&signed_in_jar());
        assert_eq!(req.path, "http://localhost:8000/api/auth/me/");
        assert_eq!(req.header("X-CSRFToken"), Some("tok"));
        assert_eq!(req.header("cookie"), Some("csrftoken=tok; sessionid=sid"));
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn build_login_serializes_credentials() {
        let input = Credentials {
            username: "alice".to_string(),
            password: "pw1".to_string(),
        };
        let req = client().build_login(&CookieJar::new(), &input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:8000/api/auth/login/");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"username": "alice", "password": "pw1"}));
    }

    #[test]
    fn build_register_uses_snake_case_confirmation() {
        let input = Registration {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
        };
        let req = client().build_register(&CookieJar::new(), &input).unwrap();
        assert_eq!(req.path, "http://localhost:8000/api/auth/register/");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["confirm_password"], "secret1");
    }

    #[test]
    fn build_logout_has_no_body() {
        let req = client().build_logout(&signed_in_jar());
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:8000/api/auth/logout/");
        assert!(req.body.is_none());
    }

    #[test]
    fn build_update_medicine_targets_id() {
        let req = client().build_update_medicine(&signed_in_jar(), 7, &aspirin()).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, "http://localhost:8000/api/medicines/7/");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["dosage"], "500mg");
    }

    #[test]
    fn build_delete_and_get_medicine_target_id() {
        let jar = signed_in_jar();
        let delete = client().build_delete_medicine(&jar, 3);
        assert_eq!(delete.method, HttpMethod::Delete);
        assert_eq!(delete.path, "http://localhost:8000/api/medicines/3/");
        assert!(delete.body.is_none());

        let get = client().build_get_medicine(&jar, 3);
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.path, delete.path);
    }

    #[test]
    fn parse_login_unwraps_user() {
        let user = client()
            .parse_login(response(200, r#"{"message":"ok","user":{"id":1,"username":"alice","email":"a@x.io","last_login":null}}"#))
            .unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.username, "alice");
        assert_eq!(user.email.as_deref(), Some("a@x.io"));
    }

    #[test]
    fn parse_login_rejection_uses_error_field() {
        let err = client()
            .parse_login(response(400, r#"{"error":"Invalid username or password"}"#))
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 400,
                message: "Invalid username or password".to_string()
            }
        );
    }

    #[test]
    fn parse_list_medicines_preserves_order() {
        let body = format!(
            r#"{{"medicines":[{},{}]}}"#,
            MEDICINE_JSON,
            MEDICINE_JSON.replace(r#""id":7"#, r#""id":2"#)
        );
        let medicines = client().parse_list_medicines(response(200, &body)).unwrap();
        assert_eq!(medicines.iter().map(|m| m.id).collect::<Vec<_>>(), vec![7, 2]);
    }

    #[test]
    fn parse_add_medicine_accepts_201() {
        let body = format!(r#"{{"message":"Medicine added successfully","medicine":{MEDICINE_JSON}}}"#);
        let medicine = client().parse_add_medicine(response(201, &body)).unwrap();
        assert_eq!(medicine.id, 7);
        assert_eq!(medicine.name, "Aspirin");
        assert!(!medicine.was_updated());
    }

    #[test]
    fn parse_update_medicine_field_errors() {
        let err = client()
            .parse_update_medicine(response(400, r#"{"name":["Medicine name cannot be empty."]}"#))
            .unwrap_err();
        assert_eq!(err.message(), "Medicine name cannot be empty.");
    }

    #[test]
    fn parse_delete_accepts_message_or_empty_body() {
        let ack = client()
            .parse_delete_medicine(response(200, r#"{"message":"Medicine deleted successfully"}"#))
            .unwrap();
        assert_eq!(ack.message.as_deref(), Some("Medicine deleted successfully"));
        assert_eq!(client().parse_delete_medicine(response(204, "")).unwrap(), Acknowledgement::default());
    }

    #[test]
    fn parse_delete_not_found() {
        let err = client()
            .parse_delete_medicine(response(404, r#"{"error":"Medicine not found"}"#))
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message(), "Medicine not found");
    }

    #[test]
    fn parse_csrf_token() {
        let token = client().parse_csrf_token(response(200, r#"{"csrf_token":"abc"}"#)).unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn success_with_bad_json_is_malformed() {
        let err = client().parse_list_medicines(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
        assert_eq!(err.message(), "Request failed");
    }

    #[test]
    fn success_without_envelope_is_malformed() {
        let err = client().parse_current_user(response(200, r#"{"id":1}"#)).unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn failure_with_bad_json_is_generic() {
        let err = client().parse_current_user(response(502, "Bad Gateway")).unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                status: 502,
                message: "Request failed".to_string()
            }
        );
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = MedicineClient::new("http://localhost:8000/api/");
        let req = client.build_list_medicines(&CookieJar::new());
        assert_eq!(req.path, "http://localhost:8000/api/medicines/");
    }
}
