#![allow(dead_code)]

use calendar_agent::components::confirmation::ConfirmationGate;
use calendar_agent::components::google_calendar::{AuthenticatedSession, CalendarClient};
use calendar_agent::config::{Config, FileSettings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CALENDAR_ID: &str = "team-calendar";
pub const EVENTS_PATH: &str = "/calendars/team-calendar/events";

/// Config whose endpoints point at a mock server
pub fn test_config(base_url: &str) -> Config {
    let base_url = base_url.to_string();
    Config::from_sources(
        move |key| match key {
            "GOOGLE_API_KEY" => Some("test-api-key".to_string()),
            "GOOGLE_CALENDAR_ID" => Some(CALENDAR_ID.to_string()),
            "TIMEZONE" => Some("Europe/London".to_string()),
            "CALENDAR_API_BASE" | "GEMINI_API_BASE" => Some(base_url.clone()),
            _ => None,
        },
        FileSettings::default(),
    )
    .expect("test config")
}

/// Gate that answers every prompt the same way and remembers what it was shown
pub struct ScriptedGate {
    approve: bool,
    asked: AtomicUsize,
    descriptions: Mutex<Vec<String>>,
}

impl ScriptedGate {
    pub fn approving() -> Arc<Self> {
        Arc::new(Self::new(true))
    }

    pub fn declining() -> Arc<Self> {
        Arc::new(Self::new(false))
    }

    fn new(approve: bool) -> Self {
        Self {
            approve,
            asked: AtomicUsize::new(0),
            descriptions: Mutex::new(Vec::new()),
        }
    }

    pub fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }

    pub fn last_description(&self) -> Option<String> {
        self.descriptions.lock().unwrap().last().cloned()
    }
}

impl ConfirmationGate for ScriptedGate {
    fn confirm(&self, description: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.descriptions.lock().unwrap().push(description.to_string());
        self.approve
    }
}

/// Calendar client talking to `base_url` with a fixed bearer token
pub fn calendar_client(base_url: &str, gate: Arc<ScriptedGate>) -> CalendarClient {
    CalendarClient::new(
        &test_config(base_url),
        Arc::new(AuthenticatedSession::new("test-token")),
        gate,
    )
}
