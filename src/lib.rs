/*!
# Shop-floor Production Records

Data capture for a single manufacturing site. Operators register, log in by
showing a personal QR code to a webcam, and fill in production forms whose
rows are appended to Excel workbooks.

## Overview

Each form type owns one `.xlsx` file, kept compatible with the workbooks the
plant already has:

| Store | File |
|-------|------|
| Registered users | `user_data.xlsx` |
| Detect Record (Coloring) | `Detect Record(Coloring).xlsx` |
| Defect Record (QA) | `Defect Record (QA).xlsx` |
| History Record (Washing) | `History Record(Washing).xlsx` |

Every record gets a serial number one above the largest already in its file,
plus the submission date. A search screen lists one store's records for a day.

## Architecture

### Storage Layer
- **table**: in-memory sheet model (header plus rows of typed cells)
- **loader**: `.xlsx` → table (calamine)
- **saving**: table → `.xlsx`, written to a temporary file and renamed into place
- **store**: the four record stores; whole-file load and append
- **sequence**: serial number allocation

### Login
- **credential**: QR credential generation and frame decoding
- **scanner**: camera abstraction and single-use scan loop with cancellation
- **login**: registration and credential lookup against the user store

### Workflow
- **session**: per-user screen state machine (home, sign-up/log-in, login, main)
- **forms**: the three production forms, option lists and submission
- **query**: date filter over a store

### Web (feature `web`)
- **app**: axum routes; the browser drives the camera and posts frames

## Concurrency

Stores are plain files with no locking across processes. Inside the web server
appends are serialized, but two servers pointed at the same directory can
still lose each other's rows.
*/

pub mod config;
pub mod credential;
pub mod error;
pub mod forms;
pub mod loader;
pub mod login;
pub mod query;
pub mod saving;
pub mod scanner;
pub mod sequence;
pub mod session;
pub mod store;
pub mod table;

#[cfg(feature = "web")]
pub mod app;

pub use error::{Error, Result};
pub use store::{RecordStore, StoreId};
pub use table::{Row, Table, Value};
