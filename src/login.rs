use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::credential::{self, CredentialImage, Frame};
use crate::error::{Error, Result};
use crate::scanner::{CancelToken, FrameSource, Scanner};
use crate::store::{RecordStore, StoreId};
use crate::table::Value;

/// Column the login lookup matches decoded credentials against
pub const EMAIL_COLUMN: &str = "Email";

/// Registration form data
///
/// Every field is required. The email doubles as the QR payload and the
/// login key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone_number: String,
}

impl Registration {
    pub fn new(name: &str, username: &str, email: &str, phone_number: &str) -> Self {
        Registration {
            name: name.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            phone_number: phone_number.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        let fields = [
            &self.name,
            &self.username,
            &self.email,
            &self.phone_number,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(Error::validation("Please fill out all fields"));
        }
        Ok(())
    }
}

/// Register a user and issue their QR credential
///
/// Appends a row to the identity store, then writes the credential image
/// into the configured folder. Unless `config.unique_emails` is set, an email
/// that is already on file is accepted again and its image regenerated.
///
/// # Errors
/// * `Error::Validation` if any field is blank, or the email is taken while
///   uniqueness is enforced; nothing is written in either case
pub fn register_user(
    config: &Config,
    store: &RecordStore,
    form: &Registration,
) -> Result<CredentialImage> {
    form.validate()?;
    let email = form.email.trim();

    if config.unique_emails && is_registered(store, email)? {
        return Err(Error::validation("Email address is already registered"));
    }

    store.append(
        StoreId::Identity,
        vec![
            ("Name".into(), form.name.trim().into()),
            ("Username".into(), form.username.trim().into()),
            (EMAIL_COLUMN.into(), email.into()),
            ("Phone Number".into(), form.phone_number.trim().into()),
        ],
    )?;

    let image = credential::issue(&config.credential_dir, email)?;
    info!("registered {email}, credential at {}", image.path.display());
    Ok(image)
}

/// Whether `email` appears in the identity store, by exact match
///
/// A store that was never written has no members.
pub fn is_registered(store: &RecordStore, email: &str) -> Result<bool> {
    let table = match store.load_all(StoreId::Identity) {
        Ok(table) => table,
        Err(Error::NotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    };

    let emails = table.column(EMAIL_COLUMN).ok_or(Error::Schema {
        store: StoreId::Identity,
        column: EMAIL_COLUMN,
    })?;

    Ok(emails
        .filter_map(|v| match v {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        })
        .any(|registered| registered == email))
}

/// Check a decoded credential against the identity store
///
/// # Returns
/// * `Ok(email)` when the payload is a registered email
///
/// # Errors
/// * `Error::Auth` when it is not
pub fn authenticate(store: &RecordStore, payload: &str) -> Result<String> {
    if is_registered(store, payload)? {
        info!("login successful for {payload}");
        Ok(payload.to_string())
    } else {
        warn!("scanned credential {payload:?} is not registered");
        Err(Error::Auth {
            payload: payload.to_string(),
        })
    }
}

/// One decode attempt on an uploaded frame, authenticated if a code is found
///
/// `Ok(None)` means no QR code was visible and the caller should try again.
pub fn authenticate_frame(store: &RecordStore, frame: &Frame) -> Result<Option<String>> {
    match credential::decode(frame) {
        Some(payload) => authenticate(store, &payload).map(Some),
        None => Ok(None),
    }
}

/// Scan a camera until a credential shows up, then authenticate it
///
/// The camera is released before this returns, whatever the outcome.
/// `Ok(None)` means the scan was cancelled.
pub fn scan_login<S: FrameSource>(
    store: &RecordStore,
    camera: S,
    cancel: &CancelToken,
) -> Result<Option<String>> {
    let payload = {
        let mut scanner = Scanner::open(camera)?;
        scanner.run(cancel)?
    };

    match payload {
        Some(payload) => authenticate(store, &payload).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ImageFiles;

    fn setup() -> (tempfile::TempDir, Config, RecordStore) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::in_dir(dir.path());
        let store = config.record_store();
        (dir, config, store)
    }

    #[test]
    fn blank_field_is_rejected_without_writing() {
        let (_dir, config, store) = setup();

        let err = register_user(&config, &store, &Registration::new("", "u", "e@x.com", "1"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!store.exists(StoreId::Identity));
        assert!(!config.credential_dir.exists());
    }

    #[test]
    fn whitespace_counts_as_blank() {
        let (_dir, config, store) = setup();
        let form = Registration::new("Alice", "  ", "a@x.com", "1");
        assert!(matches!(
            register_user(&config, &store, &form),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn duplicate_email_is_accepted_by_default() {
        let (_dir, config, store) = setup();
        let form = Registration::new("Alice", "alice", "alice@x.com", "555");

        let first = register_user(&config, &store, &form).unwrap();
        let second = register_user(&config, &store, &form).unwrap();

        assert_eq!(store.load_all(StoreId::Identity).unwrap().len(), 2);
        assert_eq!(first.path, second.path);
        assert_eq!(first.png, second.png);
    }

    #[test]
    fn duplicate_email_is_rejected_when_unique() {
        let (_dir, mut config, store) = setup();
        config.unique_emails = true;
        let form = Registration::new("Alice", "alice", "alice@x.com", "555");

        register_user(&config, &store, &form).unwrap();
        let err = register_user(&config, &store, &form).unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.load_all(StoreId::Identity).unwrap().len(), 1);
    }

    #[test]
    fn authenticate_requires_exact_match() {
        let (_dir, config, store) = setup();
        assert!(matches!(authenticate(&store, "alice@x.com"), Err(Error::Auth { .. })));

        register_user(&config, &store, &Registration::new("A", "a", "alice@x.com", "1"))
            .unwrap();

        assert_eq!(authenticate(&store, "alice@x.com").unwrap(), "alice@x.com");
        assert!(authenticate(&store, "ALICE@x.com").is_err());
        assert!(authenticate(&store, "alice@x.co").is_err());
    }

    #[test]
    fn scan_login_from_credential_file() {
        let (_dir, config, store) = setup();
        let image =
            register_user(&config, &store, &Registration::new("A", "a", "alice@x.com", "1"))
                .unwrap();

        let camera = ImageFiles::new(vec![image.path.clone()]);
        let email = scan_login(&store, camera, &CancelToken::new()).unwrap();
        assert_eq!(email.as_deref(), Some("alice@x.com"));
    }

    #[test]
    fn unknown_credential_frame_is_auth_error() {
        let (_dir, _config, store) = setup();
        let frame = Frame::from_bytes(&credential::render_png("mallory@x.com").unwrap()).unwrap();

        assert!(matches!(
            authenticate_frame(&store, &frame),
            Err(Error::Auth { payload }) if payload == "mallory@x.com"
        ));
    }
}
