//! In-memory stand-in for the medicine tracker API.
//!
//! Everything lives under `/api`. Sessions ride on a `sessionid` cookie;
//! authenticated unsafe requests must echo the `csrftoken` cookie in the
//! `x-csrftoken` header. Error bodies follow the shapes the real service
//! uses: `{"error": ...}` from auth views, `{"detail": ...}` from the
//! permission layer and `{"field": ["..."]}` from medicine validation.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sessionid";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "x-csrftoken";

const MAX_FIELD_LEN: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Account {
    id: i64,
    username: String,
    email: String,
    password: String,
    date_joined: DateTime<Utc>,
    last_login: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Record {
    owner: i64,
    medicine: Medicine,
}

#[derive(Debug, Default)]
pub struct Store {
    accounts: Vec<Account>,
    sessions: HashMap<String, i64>,
    medicines: HashMap<i64, Record>,
    last_account_id: i64,
    last_medicine_id: i64,
}

impl Store {
    fn account(&self, id: i64) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    fn session_user(&self, headers: &HeaderMap) -> Option<i64> {
        let sid = cookie(headers, SESSION_COOKIE)?;
        self.sessions.get(&sid).copied()
    }

    fn owned(&self, owner: i64, id: i64) -> Option<&Medicine> {
        self.medicines
            .get(&id)
            .filter(|r| r.owner == owner)
            .map(|r| &r.medicine)
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Default, Deserialize)]
pub struct MedicineInput {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let api = Router::new()
        .route("/auth/csrf/", get(csrf_token))
        .route("/auth/register/", post(register))
        .route("/auth/login/", post(login))
        .route("/auth/logout/", post(logout))
        .route("/auth/me/", get(current_user))
        .route("/medicines/", get(list_medicines).post(create_medicine))
        .route(
            "/medicines/{id}/",
            get(get_medicine).put(update_medicine).delete(delete_medicine),
        );
    Router::new().nest("/api", api).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// --- auth ---

async fn csrf_token(headers: HeaderMap) -> Response {
    let token = cookie(&headers, CSRF_COOKIE).unwrap_or_else(new_token);
    (
        AppendHeaders([(header::SET_COOKIE, csrf_cookie(&token))]),
        Json(json!({ "csrf_token": token })),
    )
        .into_response()
}

async fn register(State(db): State<Db>, Json(input): Json<RegisterInput>) -> Response {
    let username = input.username.trim();
    let email = input.email.trim();

    if username.is_empty() || email.is_empty() || input.password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "All fields are required (username, email, password)");
    }
    if username.chars().count() < 3 {
        return error(StatusCode::BAD_REQUEST, "Username must be at least 3 characters");
    }
    if username.chars().count() > 30 {
        return error(StatusCode::BAD_REQUEST, "Username cannot exceed 30 characters");
    }
    if !email.contains('@') || !email.contains('.') {
        return error(StatusCode::BAD_REQUEST, "Invalid email format");
    }
    if input.password.chars().count() < 6 {
        return error(StatusCode::BAD_REQUEST, "Password must be at least 6 characters");
    }
    if input.password != input.confirm_password {
        return error(StatusCode::BAD_REQUEST, "Passwords do not match");
    }

    let mut store = db.write().await;
    if store.accounts.iter().any(|a| a.username == username) {
        return error(StatusCode::BAD_REQUEST, "This username is already taken");
    }
    if store.accounts.iter().any(|a| a.email == email) {
        return error(StatusCode::BAD_REQUEST, "This email address is already in use");
    }

    store.last_account_id += 1;
    let account = Account {
        id: store.last_account_id,
        username: username.to_string(),
        email: email.to_string(),
        password: input.password,
        date_joined: Utc::now(),
        last_login: None,
    };
    tracing::info!(username = %account.username, "account registered");
    let body = json!({
        "message": "Account created successfully",
        "user": {
            "id": account.id,
            "username": account.username,
            "email": account.email,
            "created_at": account.date_joined,
        }
    });
    store.accounts.push(account);
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn login(State(db): State<Db>, headers: HeaderMap, Json(input): Json<LoginInput>) -> Response {
    let username = input.username.trim();
    if username.is_empty() || input.password.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Username and password are required");
    }

    let mut store = db.write().await;
    let Some(account) = store
        .accounts
        .iter_mut()
        .find(|a| a.username == username && a.password == input.password)
    else {
        return error(StatusCode::BAD_REQUEST, "Invalid username or password");
    };
    let now = Utc::now();
    account.last_login = Some(now);
    let user = json!({
        "id": account.id,
        "username": account.username,
        "email": account.email,
        "last_login": now,
    });
    let user_id = account.id;

    let sid = new_token();
    store.sessions.insert(sid.clone(), user_id);
    let token = cookie(&headers, CSRF_COOKIE).unwrap_or_else(new_token);
    tracing::info!(%username, "login");

    (
        AppendHeaders([
            (header::SET_COOKIE, format!("{SESSION_COOKIE}={sid}; HttpOnly; Path=/; SameSite=Lax")),
            (header::SET_COOKIE, csrf_cookie(&token)),
        ]),
        Json(json!({ "message": "Login successful", "user": user })),
    )
        .into_response()
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Response {
    let mut store = db.write().await;
    if store.session_user(&headers).is_none() {
        return Json(json!({ "message": "Already logged out" })).into_response();
    }
    if let Err(rejection) = check_csrf(&headers) {
        return rejection;
    }
    if let Some(sid) = cookie(&headers, SESSION_COOKIE) {
        store.sessions.remove(&sid);
    }
    (
        AppendHeaders([(
            header::SET_COOKIE,
            format!(r#"{SESSION_COOKIE}=""; expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; Path=/"#),
        )]),
        Json(json!({ "message": "Logged out successfully" })),
    )
        .into_response()
}

async fn current_user(State(db): State<Db>, headers: HeaderMap) -> Response {
    let store = db.read().await;
    let Some(account) = store.session_user(&headers).and_then(|id| store.account(id)) else {
        return error(StatusCode::UNAUTHORIZED, "Not authenticated");
    };
    Json(json!({
        "user": {
            "id": account.id,
            "username": account.username,
            "email": account.email,
            "is_active": true,
            "date_joined": account.date_joined,
            "last_login": account.last_login,
        }
    }))
    .into_response()
}

// --- medicines ---

async fn list_medicines(State(db): State<Db>, headers: HeaderMap) -> Response {
    let store = db.read().await;
    let owner = match authorize(&store, &headers, false) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };
    let mut medicines: Vec<&Medicine> = store
        .medicines
        .values()
        .filter(|r| r.owner == owner)
        .map(|r| &r.medicine)
        .collect();
    medicines.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Json(json!({ "medicines": medicines })).into_response()
}

async fn create_medicine(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<MedicineInput>,
) -> Response {
    let mut store = db.write().await;
    let owner = match authorize(&store, &headers, true) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };
    let (name, dosage, frequency) = match validate_medicine(&input) {
        Ok(fields) => fields,
        Err(rejection) => return rejection,
    };

    store.last_medicine_id += 1;
    let now = Utc::now();
    let medicine = Medicine {
        id: store.last_medicine_id,
        name,
        dosage,
        frequency,
        created_at: now,
        updated_at: now,
    };
    store.medicines.insert(
        medicine.id,
        Record {
            owner,
            medicine: medicine.clone(),
        },
    );
    (
        StatusCode::CREATED,
        Json(json!({ "message": "Medicine added successfully", "medicine": medicine })),
    )
        .into_response()
}

async fn get_medicine(State(db): State<Db>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let store = db.read().await;
    let owner = match authorize(&store, &headers, false) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };
    match store.owned(owner, id) {
        Some(medicine) => Json(json!({ "medicine": medicine })).into_response(),
        None => not_found(),
    }
}

async fn update_medicine(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<MedicineInput>,
) -> Response {
    let mut store = db.write().await;
    let owner = match authorize(&store, &headers, true) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };
    if store.owned(owner, id).is_none() {
        return not_found();
    }
    let (name, dosage, frequency) = match validate_medicine(&input) {
        Ok(fields) => fields,
        Err(rejection) => return rejection,
    };
    let Some(record) = store.medicines.get_mut(&id) else {
        return not_found();
    };
    record.medicine.name = name;
    record.medicine.dosage = dosage;
    record.medicine.frequency = frequency;
    record.medicine.updated_at = Utc::now();
    Json(json!({ "message": "Medicine updated successfully", "medicine": record.medicine }))
        .into_response()
}

async fn delete_medicine(State(db): State<Db>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    let mut store = db.write().await;
    let owner = match authorize(&store, &headers, true) {
        Ok(owner) => owner,
        Err(rejection) => return rejection,
    };
    if store.owned(owner, id).is_none() {
        return not_found();
    }
    store.medicines.remove(&id);
    Json(json!({ "message": "Medicine deleted successfully" })).into_response()
}

// --- helpers ---

/// Resolve the signed-in account. Unsafe methods also need a matching
/// anti-forgery header.
fn authorize(store: &Store, headers: &HeaderMap, unsafe_method: bool) -> Result<i64, Response> {
    let Some(owner) = store.session_user(headers) else {
        return Err(detail(
            StatusCode::FORBIDDEN,
            "Authentication credentials were not provided.",
        ));
    };
    if unsafe_method {
        check_csrf(headers)?;
    }
    Ok(owner)
}

fn check_csrf(headers: &HeaderMap) -> Result<(), Response> {
    let expected = cookie(headers, CSRF_COOKIE);
    let presented = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    match (expected.as_deref(), presented) {
        (Some(expected), Some(presented)) if !expected.is_empty() && expected == presented => Ok(()),
        _ => Err(detail(
            StatusCode::FORBIDDEN,
            "CSRF Failed: CSRF token missing or incorrect.",
        )),
    }
}

/// Trimmed field values, or a 400 carrying one message list per bad field.
fn validate_medicine(input: &MedicineInput) -> Result<(String, String, String), Response> {
    let mut errors = Map::new();
    let name = check_field(&mut errors, "name", input.name.as_deref(), "Medicine name");
    let dosage = check_field(&mut errors, "dosage", input.dosage.as_deref(), "Dosage");
    let frequency = check_field(&mut errors, "frequency", input.frequency.as_deref(), "Frequency");
    if !errors.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(Value::Object(errors))).into_response());
    }
    Ok((name, dosage, frequency))
}

fn check_field(errors: &mut Map<String, Value>, key: &str, value: Option<&str>, label: &str) -> String {
    let message = match value.map(str::trim) {
        None => "This field is required.".to_string(),
        Some("") => format!("{label} cannot be empty."),
        Some(v) if v.chars().count() > MAX_FIELD_LEN => {
            format!("{label} is too long (max {MAX_FIELD_LEN} characters).")
        }
        Some(v) => return v.to_string(),
    };
    errors.insert(key.to_string(), json!([message]));
    String::new()
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().to_string())
}

fn csrf_cookie(token: &str) -> String {
    format!("{CSRF_COOKIE}={token}; Path=/; SameSite=Lax")
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "Medicine not found")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn medicine_serializes_to_json() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let medicine = Medicine {
            id: 7,
            name: "Aspirin".to_string(),
            dosage: "500mg".to_string(),
            frequency: "daily".to_string(),
            created_at: at,
            updated_at: at,
        };
        let json = serde_json::to_value(&medicine).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["name"], "Aspirin");
        assert_eq!(json["created_at"], "2024-03-01T09:00:00Z");
    }

    #[test]
    fn register_input_defaults_missing_fields() {
        let input: RegisterInput = serde_json::from_str(r#"{"username":"alice"}"#).unwrap();
        assert_eq!(input.username, "alice");
        assert!(input.email.is_empty());
        assert!(input.confirm_password.is_empty());
    }

    #[test]
    fn cookie_lookup_splits_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("csrftoken=abc; sessionid=xyz"),
        );
        assert_eq!(cookie(&headers, SESSION_COOKIE).as_deref(), Some("xyz"));
        assert_eq!(cookie(&headers, CSRF_COOKIE).as_deref(), Some("abc"));
        assert_eq!(cookie(&headers, "missing"), None);
    }

    #[test]
    fn field_errors_keep_field_order() {
        let input = MedicineInput {
            name: Some("  ".to_string()),
            dosage: None,
            frequency: Some("x".repeat(101)),
        };
        let mut errors = Map::new();
        check_field(&mut errors, "name", input.name.as_deref(), "Medicine name");
        check_field(&mut errors, "dosage", input.dosage.as_deref(), "Dosage");
        check_field(&mut errors, "frequency", input.frequency.as_deref(), "Frequency");
        let keys: Vec<&str> = errors.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "dosage", "frequency"]);
        assert_eq!(errors["name"], json!(["Medicine name cannot be empty."]));
        assert_eq!(errors["dosage"], json!(["This field is required."]));
        assert_eq!(errors["frequency"], json!(["Frequency is too long (max 100 characters)."]));
    }

    #[test]
    fn csrf_requires_matching_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("csrftoken=abc"));
        assert!(check_csrf(&headers).is_err());
        headers.insert(CSRF_HEADER, HeaderValue::from_static("nope"));
        assert!(check_csrf(&headers).is_err());
        headers.insert(CSRF_HEADER, HeaderValue::from_static("abc"));
        assert!(check_csrf(&headers).is_ok());
    }
}
