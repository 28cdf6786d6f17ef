use thiserror::Error;

use crate::store::StoreId;

/// Errors surfaced by the capture workflow
///
/// Every variant maps to a user-facing message; the web layer turns them into
/// status codes and the CLI prints them.
#[derive(Error, Debug)]
pub enum Error {
    /// Store file has never been written
    #[error("{0} not found")]
    NotFound(StoreId),

    /// An expected column is missing from a store
    #[error("No {column} column found in {store}")]
    Schema { store: StoreId, column: &'static str },

    /// Required input missing or outside the allowed options
    #[error("{0}")]
    Validation(String),

    /// Camera could not be opened or a frame could not be read
    #[error("{0}")]
    Capture(String),

    /// Decoded credential is not registered
    #[error("User not found. Please register first.")]
    Auth { payload: String },

    /// Operation needs a logged-in session
    #[error("Please log in first.")]
    Unauthenticated,

    /// Screen transition not allowed from the current state
    #[error("Cannot {event} from the {screen} screen")]
    Navigation {
        event: &'static str,
        screen: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read spreadsheet: {0}")]
    SheetRead(#[from] calamine::XlsxError),

    #[error("Failed to write spreadsheet: {0}")]
    SheetWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("QR encoding failed: {0}")]
    QrEncode(#[from] qrcode::types::QrError),
}

impl Error {
    /// Shorthand for a validation failure with a message
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Shorthand for a capture failure with a message
    pub fn capture(message: impl Into<String>) -> Self {
        Error::Capture(message.into())
    }

    /// Whether the error means "this store does not exist yet"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "web")]
mod response {
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };

    use super::Error;

    impl Error {
        pub fn status(&self) -> StatusCode {
            match self {
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Schema { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                Error::Validation(_) => StatusCode::BAD_REQUEST,
                Error::Capture(_) => StatusCode::SERVICE_UNAVAILABLE,
                Error::Auth { .. } | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
                Error::Navigation { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    impl IntoResponse for Error {
        fn into_response(self) -> Response {
            let status = self.status();
            if status.is_server_error() {
                log::error!("{self}");
            }
            let body = serde_json::json!({
                "status": "error",
                "message": self.to_string(),
            });

            (status, Json(body)).into_response()
        }
    }
}
