//! End-to-end flows against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the `Controller`
//! over real HTTP using ureq. Validates that request building, cookie
//! handling, response parsing and state reconciliation all agree with the
//! actual server.

use std::time::Duration;

use medtrack_core::{
    ApiError, AppState, ClientConfig, Controller, FlowError, Gateway, HttpMethod, HttpRequest,
    HttpResponse, LoginForm, MedicineClient, MedicineForm, Notice, NoticeLevel, Page, SignupForm,
    Transport, ValidationError, View,
};

/// Executes requests with ureq, returning 4xx/5xx as data.
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&mut self, req: HttpRequest) -> Result<HttpResponse, ApiError> {
        let body = req.body.unwrap_or_default();
        let result = match req.method {
            HttpMethod::Get => with_headers(self.agent.get(&req.path), &req.headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(&req.path), &req.headers).call(),
            HttpMethod::Post => with_headers(self.agent.post(&req.path), &req.headers).send(body.as_bytes()),
            HttpMethod::Put => with_headers(self.agent.put(&req.path), &req.headers).send(body.as_bytes()),
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string().unwrap_or_default();
        Ok(HttpResponse { status, headers, body })
    }
}

#[derive(Default)]
struct RecordingView {
    pages: Vec<Page>,
    notices: Vec<Notice>,
    decline: bool,
}

impl View for RecordingView {
    fn show_page(&mut self, page: Page, _state: &AppState) {
        self.pages.push(page);
    }

    fn show_page_after(&mut self, page: Page, _delay: Duration) {
        self.pages.push(page);
    }

    fn render(&mut self, _state: &AppState) {}

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn set_busy(&mut self, _busy: bool) {}

    fn confirm(&mut self, _prompt: &str) -> bool {
        !self.decline
    }
}

fn start_server() -> std::net::SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });
    addr
}

fn controller(base_url: &str) -> Controller<UreqTransport, RecordingView> {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        logout_redirect_delay_ms: 0,
    };
    let gateway = Gateway::new(MedicineClient::new(&config.base_url), UreqTransport::new());
    Controller::new(gateway, RecordingView::default(), config)
}

fn form(name: &str, dosage: &str, frequency: &str) -> MedicineForm {
    MedicineForm {
        name: name.to_string(),
        dosage: dosage.to_string(),
        frequency: frequency.to_string(),
    }
}

#[test]
fn session_and_medicine_lifecycle() {
    let addr = start_server();
    let mut app = controller(&format!("http://{addr}/api"));

    // Step 1: no session yet.
    app.start().unwrap();
    assert!(!app.state().is_authenticated());
    assert_eq!(app.state().page(), Page::Home);

    // Step 2: obtain the anti-forgery cookie.
    app.gateway_mut().prime_csrf().unwrap();
    assert!(app.gateway().cookies().get("csrftoken").is_some());

    // Step 3: unknown user.
    let login = LoginForm {
        username: "alice".to_string(),
        password: "secret1".to_string(),
    };
    let err = app.submit_login(&login).unwrap_err();
    assert!(matches!(err, FlowError::Api(ApiError::Rejected { status: 400, .. })));
    assert_eq!(
        app.view().notices.last().unwrap().message,
        "Invalid username or password"
    );

    // Step 4: signup, first with a mismatch caught locally.
    let mut signup = SignupForm {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret2".to_string(),
    };
    assert_eq!(
        app.submit_signup(&signup).unwrap_err(),
        FlowError::Invalid(ValidationError::PasswordMismatch)
    );
    signup.confirm_password = "secret1".to_string();
    app.submit_signup(&signup).unwrap();
    assert_eq!(app.state().page(), Page::Login);
    assert!(!app.state().is_authenticated());

    // Step 5: login lands on an empty dashboard.
    app.submit_login(&login).unwrap();
    assert_eq!(app.state().session().unwrap().username, "alice");
    assert_eq!(app.state().page(), Page::Dashboard);
    assert!(app.state().medicines().is_empty());

    // Step 6: add two medicines. Each save re-enters the dashboard, so the
    // cache follows the server's name order rather than insertion order.
    app.begin_add();
    app.save_medicine(&form(" Zinc ", "10mg", "daily")).unwrap();
    app.begin_add();
    app.save_medicine(&form("Aspirin", "500mg", "daily")).unwrap();
    let names: Vec<&str> = app.state().medicines().iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Aspirin", "Zinc"]);
    assert_eq!(app.state().page(), Page::Dashboard);
    let aspirin_id = app.state().medicines()[0].id;

    // Step 7: server-side validation error surfaces its first field message.
    // Whitespace-only input is caught locally, so send something too long.
    app.begin_add();
    let err = app.save_medicine(&form(&"x".repeat(101), "1", "daily")).unwrap_err();
    assert!(matches!(err, FlowError::Api(ApiError::Rejected { status: 400, .. })));
    assert_eq!(
        app.view().notices.last().unwrap().message,
        "Medicine name is too long (max 100 characters)."
    );
    assert_eq!(app.state().medicines().len(), 2);

    // Step 8: edit.
    app.begin_edit(aspirin_id).unwrap();
    app.save_medicine(&form("Aspirin", "250mg", "twice daily")).unwrap();
    let aspirin = app.state().medicine(aspirin_id).unwrap().clone();
    assert_eq!(aspirin.dosage, "250mg");
    assert_eq!(aspirin.frequency, "twice daily");

    // Step 9: a reload agrees with the reconciled cache, in server order.
    let cached = app.state().medicines().to_vec();
    app.load_medicines().unwrap();
    let reloaded = app.state().medicines();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded[0], aspirin);
    assert!(cached.iter().all(|m| reloaded.contains(m)));

    // Step 10: declined delete keeps the record; confirmed delete drops it.
    app.view_mut().decline = true;
    app.delete_medicine(aspirin_id).unwrap();
    assert!(app.state().medicine(aspirin_id).is_some());
    app.view_mut().decline = false;
    app.delete_medicine(aspirin_id).unwrap();
    assert!(app.state().medicine(aspirin_id).is_none());

    // Step 11: deleting it again is a remote failure that leaves the cache.
    let before = app.state().medicines().to_vec();
    app.delete_medicine(aspirin_id).unwrap_err();
    assert_eq!(app.state().medicines(), before.as_slice());
    let notice = app.view().notices.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Failed to delete medicine: Medicine not found");

    // Step 12: logout drops the session cookie and the local state.
    app.logout().unwrap();
    assert!(!app.state().is_authenticated());
    assert!(app.state().medicines().is_empty());
    assert!(app.gateway().cookies().get("sessionid").is_none());
    assert_eq!(app.view().pages.last(), Some(&Page::Home));

    // Step 13: a fresh probe confirms the server forgot us.
    app.start().unwrap();
    assert!(!app.state().is_authenticated());
    app.show_dashboard().unwrap();
    assert_eq!(app.state().page(), Page::Login);
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let mut app = controller(&format!("http://{addr}/api"));

    let err = app
        .submit_login(&LoginForm {
            username: "alice".to_string(),
            password: "secret1".to_string(),
        })
        .unwrap_err();

    assert!(matches!(err, FlowError::Api(ApiError::Transport(_))));
    assert_eq!(app.view().notices.last().unwrap().level, NoticeLevel::Error);
    assert!(!app.state().is_authenticated());
}
