use axum::{
    Form, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::config::Config;
use crate::credential::{self, Frame};
use crate::error::{Error, Result};
use crate::forms::{self, ColoringForm, QaForm, Submission, WashingForm};
use crate::login::{self, Registration};
use crate::query;
use crate::sequence;
use crate::session::{Event, MainPage, Screen, Session};
use crate::store::{RecordStore, StoreId};
use crate::table::Table;

const SESSION_COOKIE: &str = "session";

/// Session lifetime, one working day
const SESSION_DURATION: u64 = 12 * 60 * 60;

struct SessionEntry {
    session: Session,
    expires_at: SystemTime,
}

/// Shared server state
///
/// Sessions are keyed by the id in the `session` cookie and exist only once
/// the server has issued that id. Appends take the write lock so two requests
/// in this process never rewrite a store at once.
pub struct AppState {
    pub config: Config,
    pub store: RecordStore,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    write_lock: Mutex<()>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            store: config.record_store(),
            config,
            sessions: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Session id from the cookie, if it names a live session we issued
    fn live_session(&self, jar: &CookieJar) -> Option<String> {
        let id = jar.get(SESSION_COOKIE)?.value();
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(id)
            .filter(|entry| entry.expires_at > SystemTime::now())
            .map(|_| id.to_string())
    }

    /// Store `session` under a fresh id, dropping expired sessions
    fn issue_session(&self, session: Session) -> String {
        let id = Uuid::new_v4().to_string();
        let now = SystemTime::now();
        let expires_at = now + Duration::from_secs(SESSION_DURATION);

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, entry| entry.expires_at > now);
        sessions.insert(id.clone(), SessionEntry { session, expires_at });
        id
    }

    fn end_session(&self, id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(id);
    }

    /// Run `f` against a live session; `None` if `id` is unknown or expired
    fn with_session<T>(&self, id: &str, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions
            .get_mut(id)
            .filter(|entry| entry.expires_at > SystemTime::now())?;
        Some(f(&mut entry.session))
    }

    /// Current screen of the caller, `Home` for visitors without a session
    fn view(&self, jar: &CookieJar) -> ScreenView {
        self.live_session(jar)
            .and_then(|id| self.with_session(&id, |session| ScreenView::of(session)))
            .unwrap_or_else(|| ScreenView::of(&Session::new()))
    }

    fn logged_in_as(&self, jar: &CookieJar) -> Result<String> {
        let id = self.live_session(jar).ok_or(Error::Unauthenticated)?;
        self.with_session(&id, |session| session.require_login().map(str::to_string))
            .unwrap_or(Err(Error::Unauthenticated))
    }

    /// Apply a navigation event to the caller's session
    ///
    /// A visitor without a live session starts from a fresh one, which is
    /// only stored, and its cookie set, if the event is accepted. Logging out
    /// ends the session.
    fn apply(&self, jar: CookieJar, event: Event) -> Result<(CookieJar, ScreenView)> {
        let ends_session = event == Event::Logout;

        let (jar, id, view) = match self.live_session(&jar) {
            Some(id) => {
                let view = self
                    .with_session(&id, |session| {
                        session.handle(event)?;
                        Ok::<_, Error>(ScreenView::of(session))
                    })
                    .unwrap_or(Err(Error::Unauthenticated))?;
                (jar, id, view)
            }
            None => {
                let mut session = Session::new();
                session.handle(event)?;
                let view = ScreenView::of(&session);
                let id = self.issue_session(session);
                (jar.add(session_cookie(id.clone())), id, view)
            }
        };

        if ends_session {
            self.end_session(&id);
            return Ok((jar.remove(Cookie::build(SESSION_COOKIE).path("/")), view));
        }
        Ok((jar, view))
    }
}

fn session_cookie(id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .build()
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/screen", get(get_screen))
        .route("/api/navigate", post(navigate))
        .route("/api/register", post(handle_register))
        .route("/api/credential/:email", get(download_credential))
        .route("/api/login/scan", post(handle_scan))
        .route("/api/logout", post(handle_logout))
        .route("/api/options", get(get_options))
        .route("/api/forms/:kind/next-serial", get(get_next_serial))
        .route("/api/forms/:kind", post(submit_form))
        .route("/api/search", get(search))
        .with_state(state)
}

pub async fn run(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config));
    let app = router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on http://{bind_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

const INDEX_HTML: &str = include_str!("./static/index.html");

async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
struct ScreenView {
    #[serde(flatten)]
    screen: Screen,
    logged_in: bool,
    user_email: Option<String>,
}

impl ScreenView {
    fn of(session: &Session) -> Self {
        ScreenView {
            screen: session.screen().clone(),
            logged_in: session.is_logged_in(),
            user_email: session.user_email().map(str::to_string),
        }
    }
}

async fn get_screen(State(state): State<Arc<AppState>>, jar: CookieJar) -> Json<ScreenView> {
    Json(state.view(&jar))
}

/// Navigation the browser may request directly
///
/// Logging in is deliberately absent: only a scanned credential can do that.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Navigation {
    Start,
    ChooseSignup,
    ChooseLogin,
    Continue,
    SelectPage { page: MainPage },
    Logout,
}

impl From<Navigation> for Event {
    fn from(nav: Navigation) -> Self {
        match nav {
            Navigation::Start => Event::Start,
            Navigation::ChooseSignup => Event::ChooseSignup,
            Navigation::ChooseLogin => Event::ChooseLogin,
            Navigation::Continue => Event::Continue,
            Navigation::SelectPage { page } => Event::SelectPage(page),
            Navigation::Logout => Event::Logout,
        }
    }
}

async fn navigate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(nav): Json<Navigation>,
) -> Result<impl IntoResponse> {
    let (jar, view) = state.apply(jar, nav.into())?;
    Ok((jar, Json(view)))
}

async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    let (jar, view) = state.apply(jar, Event::Logout)?;
    Ok((jar, Json(view)))
}

#[derive(Serialize)]
struct RegisterResponse {
    status: &'static str,
    message: &'static str,
    file_name: String,
    data_uri: String,
    download_link: String,
}

async fn handle_register(
    State(state): State<Arc<AppState>>,
    Form(form): Form<Registration>,
) -> Result<Json<RegisterResponse>> {
    let image = {
        let _guard = state.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        login::register_user(&state.config, &state.store, &form)?
    };

    Ok(Json(RegisterResponse {
        status: "ok",
        message: "Registration successful! Please save your QR code. You'll need it to log in.",
        file_name: image.file_name(),
        data_uri: image.data_uri(),
        download_link: image.download_link(),
    }))
}

async fn download_credential(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Response {
    let path = credential::credential_path(&state.config.credential_dir, &email);
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    match fs::read(&path) {
        Ok(png) => (
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            png,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Credential not found").into_response(),
    }
}

#[derive(Serialize)]
struct ScanResponse {
    status: &'static str,
    #[serde(flatten)]
    view: ScreenView,
}

/// One decode attempt on a frame posted by the browser's camera loop
///
/// `status: "scanning"` tells the browser to send another frame. A decoded
/// but unregistered code ends the attempt with 401; the session stays on the
/// login screen.
async fn handle_scan(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let id = state.live_session(&jar);
    let screen = id
        .as_deref()
        .and_then(|id| state.with_session(id, |session| session.screen().clone()))
        .unwrap_or(Screen::Home);
    let Some(id) = id.filter(|_| screen == Screen::Login) else {
        return Err(Error::Navigation {
            event: "scan a credential",
            screen: screen.name(),
        });
    };

    let capture_failed = |e: axum::extract::multipart::MultipartError| {
        Error::capture(format!("Failed to capture the frame: {e}"))
    };
    let mut frame_data = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(capture_failed)? {
        if field.name() == Some("frame") {
            frame_data = field.bytes().await.map_err(capture_failed)?.to_vec();
        }
    }
    if frame_data.is_empty() {
        return Err(Error::capture("Failed to capture the frame."));
    }

    let frame = Frame::from_bytes(&frame_data)
        .map_err(|e| Error::capture(format!("Failed to capture the frame: {e}")))?;

    let outcome = login::authenticate_frame(&state.store, &frame);
    let (status, view) = state
        .with_session(&id, |session| match outcome {
            Ok(Some(email)) => {
                session.handle(Event::CredentialMatched(email))?;
                Ok(("ok", ScreenView::of(session)))
            }
            Ok(None) => Ok(("scanning", ScreenView::of(session))),
            Err(e) => {
                session.handle(Event::NoMatch)?;
                Err(e)
            }
        })
        .unwrap_or(Err(Error::Unauthenticated))?;

    Ok((jar, Json(ScanResponse { status, view })))
}

async fn get_options() -> Json<forms::Options> {
    Json(forms::options())
}

fn production_store(kind: &str) -> Result<StoreId> {
    StoreId::from_name(kind)
        .filter(|id| StoreId::PRODUCTION.contains(id))
        .ok_or_else(|| Error::validation(format!("Unknown form: {kind}")))
}

#[derive(Serialize)]
struct SerialResponse {
    store: StoreId,
    serial: u64,
}

async fn get_next_serial(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<Json<SerialResponse>> {
    let id = production_store(&kind)?;
    Ok(Json(SerialResponse {
        store: id,
        serial: sequence::next_serial(&state.store, id),
    }))
}

fn parse_form<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| Error::validation(format!("Invalid form: {e}")))
}

async fn submit_form(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(kind): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse> {
    let operator = state.logged_in_as(&jar)?;
    let store_id = production_store(&kind)?;
    let now = Local::now().naive_local();

    let submission: Submission = {
        let _guard = state.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match store_id {
            StoreId::Coloring => {
                forms::submit(&state.store, parse_form::<ColoringForm>(body)?, now)?
            }
            StoreId::Qa => forms::submit(&state.store, parse_form::<QaForm>(body)?, now)?,
            _ => forms::submit(&state.store, parse_form::<WashingForm>(body)?, now)?,
        }
    };
    log::info!("{operator} submitted {} #{}", submission.store, submission.serial);

    Ok((
        jar,
        Json(serde_json::json!({
            "status": "ok",
            "message": format!("Data for {} has been saved successfully!", submission.store),
            "serial": submission.serial,
        })),
    ))
}

#[derive(Deserialize)]
struct SearchQuery {
    store: String,
    date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct SearchResponse {
    date: NaiveDate,
    message: Option<&'static str>,
    #[serde(flatten)]
    table: Table,
}

async fn search(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    state.logged_in_as(&jar)?;

    let store_id = production_store(&params.store)?;
    let date = params.date.unwrap_or_else(|| Local::now().date_naive());
    let table = query::filter_by_date(&state.store, store_id, date)?;

    let message = table
        .is_empty()
        .then_some("No records found for the selected date.");
    Ok((jar, Json(SearchResponse { date, message, table })))
}
