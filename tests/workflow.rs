use chrono::NaiveDate;
use shopfloor::config::Config;
use shopfloor::credential::{self, Frame};
use shopfloor::forms::{self, QaForm};
use shopfloor::login::{self, Registration};
use shopfloor::query;
use shopfloor::sequence::next_serial;
use shopfloor::session::{Event, MainPage, Screen, Session};
use shopfloor::{Error, StoreId, Value};

fn qa_form(job: &str) -> QaForm {
    QaForm {
        shift: "B".into(),
        job_no: job.into(),
        part_name: "Bearing".into(),
        supplier: "In-house".into(),
        location: "Bay 3".into(),
        machine_no: "M-12".into(),
        program_no: "P-4".into(),
        ok_qty: 95,
        ng_qty: 5,
        rework_qty: 0,
        rejection_reason: "Scratch".into(),
        operator_name: "Shrinnivisan".into(),
    }
}

#[test]
fn register_scan_and_reach_main_screen() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::in_dir(dir.path());
    let store = config.record_store();
    let mut session = Session::new();

    session.handle(Event::Start).unwrap();
    session.handle(Event::ChooseSignup).unwrap();
    let image = login::register_user(
        &config,
        &store,
        &Registration::new("Alice", "alice", "alice@x.com", "9876543210"),
    )
    .unwrap();
    session.handle(Event::Continue).unwrap();
    assert_eq!(session.screen(), &Screen::Login);

    // The camera sees the printed credential
    let frame = Frame::from_bytes(&std::fs::read(&image.path).unwrap()).unwrap();
    let payload = credential::decode(&frame).unwrap();
    assert_eq!(payload, "alice@x.com");

    let email = login::authenticate(&store, &payload).unwrap();
    session.handle(Event::CredentialMatched(email)).unwrap();

    assert!(session.is_logged_in());
    assert_eq!(session.user_email(), Some("alice@x.com"));
    assert_eq!(
        session.screen(),
        &Screen::Main {
            page: MainPage::Coloring
        }
    );
}

#[test]
fn unregistered_credential_keeps_user_on_login() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::in_dir(dir.path());
    let store = config.record_store();
    let mut session = Session::new();
    session.handle(Event::Start).unwrap();
    session.handle(Event::Continue).unwrap();

    let frame = Frame::from_bytes(&credential::render_png("eve@x.com").unwrap()).unwrap();
    match login::authenticate_frame(&store, &frame) {
        Err(Error::Auth { payload }) => {
            assert_eq!(payload, "eve@x.com");
            session.handle(Event::NoMatch).unwrap();
        }
        other => panic!("expected auth failure, got {other:?}"),
    }

    assert_eq!(session.screen(), &Screen::Login);
    assert!(!session.is_logged_in());
}

#[test]
fn n_submissions_read_back_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = Config::in_dir(dir.path()).record_store();
    let day = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
    let at = day.and_hms_opt(14, 0, 0).unwrap();

    assert_eq!(next_serial(&store, StoreId::Qa), 1);
    let jobs: Vec<String> = (1..=6).map(|n| format!("J-{n}")).collect();
    for job in &jobs {
        forms::submit(&store, qa_form(job), at).unwrap();
    }

    let table = store.load_all(StoreId::Qa).unwrap();
    assert_eq!(table.len(), jobs.len());

    let serials: Vec<i64> = table
        .column("Serial Number")
        .unwrap()
        .filter_map(Value::as_integer)
        .collect();
    assert_eq!(serials, (1..=6).collect::<Vec<_>>());

    let recorded: Vec<String> = table
        .column("JOB NO")
        .unwrap()
        .map(|v| v.to_string())
        .collect();
    assert_eq!(recorded, jobs);
    assert_eq!(next_serial(&store, StoreId::Qa), 7);

    let found = query::filter_by_date(&store, StoreId::Qa, day).unwrap();
    assert_eq!(found.len(), 6);
    let other_day = query::filter_by_date(&store, StoreId::Qa, day.succ_opt().unwrap()).unwrap();
    assert!(other_day.is_empty());
}

#[test]
fn searching_an_unwritten_store_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = Config::in_dir(dir.path()).record_store();
    let day = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();

    let message = match query::filter_by_date(&store, StoreId::Washing, day) {
        Ok(_) => panic!("store should not exist"),
        Err(e) => e.to_string(),
    };
    assert_eq!(message, "History Record (Washing) not found");
}
