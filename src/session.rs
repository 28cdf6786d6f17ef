use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sub-pages reachable from the main screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainPage {
    #[default]
    Coloring,
    Qa,
    Washing,
    Search,
}

/// Radio choice on the sign-up / log-in screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthChoice {
    #[default]
    SignUp,
    LogIn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum Screen {
    Home,
    SignupOrLogin { choice: AuthChoice },
    Login,
    Main { page: MainPage },
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Home => "home",
            Screen::SignupOrLogin { .. } => "sign-up/log-in",
            Screen::Login => "login",
            Screen::Main { .. } => "main",
        }
    }
}

/// Something the user did that may move them to another screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    ChooseSignup,
    ChooseLogin,
    /// "Proceed to Login"
    Continue,
    CredentialMatched(String),
    NoMatch,
    SelectPage(MainPage),
    Logout,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::ChooseSignup => "choose sign up",
            Event::ChooseLogin => "choose log in",
            Event::Continue => "continue to login",
            Event::CredentialMatched(_) => "log in",
            Event::NoMatch => "report a failed scan",
            Event::SelectPage(_) => "select a page",
            Event::Logout => "log out",
        }
    }
}

/// Navigation state for one user
///
/// Owned by whoever drives the screens and passed by reference to each
/// handler; nothing here is global or survives a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    screen: Screen,
    logged_in: bool,
    user_email: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            screen: Screen::Home,
            logged_in: false,
            user_email: None,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn user_email(&self) -> Option<&str> {
        self.user_email.as_deref()
    }

    /// Email of the logged-in user, or an error for anonymous sessions
    pub fn require_login(&self) -> Result<&str> {
        match (&self.logged_in, &self.user_email) {
            (true, Some(email)) => Ok(email),
            _ => Err(Error::Unauthenticated),
        }
    }

    /// Apply an event and return the screen that is now active
    ///
    /// Events that make no sense on the current screen are rejected and the
    /// session is left untouched.
    pub fn handle(&mut self, event: Event) -> Result<&Screen> {
        let next = match (&self.screen, event) {
            (Screen::Home, Event::Start) => Screen::SignupOrLogin {
                choice: AuthChoice::default(),
            },
            (Screen::SignupOrLogin { .. }, Event::ChooseSignup) => Screen::SignupOrLogin {
                choice: AuthChoice::SignUp,
            },
            (Screen::SignupOrLogin { .. }, Event::ChooseLogin) => Screen::SignupOrLogin {
                choice: AuthChoice::LogIn,
            },
            (Screen::SignupOrLogin { .. }, Event::Continue) => Screen::Login,
            (Screen::Login, Event::CredentialMatched(email)) => {
                info!("session logged in as {email}");
                self.logged_in = true;
                self.user_email = Some(email);
                Screen::Main {
                    page: MainPage::default(),
                }
            }
            (Screen::Login, Event::NoMatch) => Screen::Login,
            (Screen::Main { .. }, Event::SelectPage(page)) => Screen::Main { page },
            (Screen::Main { .. }, Event::Logout) => {
                self.logged_in = false;
                self.user_email = None;
                Screen::Home
            }
            (screen, event) => {
                return Err(Error::Navigation {
                    event: event.name(),
                    screen: screen.name(),
                });
            }
        };

        self.screen = self.guard(next);
        Ok(&self.screen)
    }

    // A logged-in user never sits on the login screen, and the main screen
    // is only reachable while logged in.
    fn guard(&self, screen: Screen) -> Screen {
        match screen {
            Screen::Login if self.logged_in => Screen::Main {
                page: MainPage::default(),
            },
            Screen::Main { .. } if !self.logged_in => Screen::Login,
            other => other,
        }
    }
}
