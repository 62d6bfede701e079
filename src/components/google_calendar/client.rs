use super::actions::{unique_master_ids, ProposedAction};
use super::models::{
    CalendarEvent, CalendarList, CalendarListEntry, EventList, EventTime, NewEvent, Reminders,
};
use super::token::SessionProvider;
use crate::components::confirmation::{ConfirmationGate, CANCELLED_MESSAGE};
use crate::config::Config;
use crate::utils::time::{
    current_datetime, default_end_time, format_local_timestamp, parse_local_timestamp,
    search_lower_bound,
};
use chrono::Utc;
use chrono_tz::Tz;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Failure of a single Calendar API call.
///
/// Never leaves the client: every operation renders it into its result
/// message so the model can read it.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("not authorized: {0}")]
    Session(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Client for the single configured calendar
pub struct CalendarClient {
    client: Client,
    api_base: String,
    calendar_id: String,
    timezone: Tz,
    sessions: Arc<dyn SessionProvider>,
    gate: Arc<dyn ConfirmationGate>,
}

impl CalendarClient {
    pub fn new(
        config: &Config,
        sessions: Arc<dyn SessionProvider>,
        gate: Arc<dyn ConfirmationGate>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: config.calendar_api_base.clone(),
            calendar_id: config.google_calendar_id.clone(),
            timezone: config.timezone,
            sessions,
            gate,
        }
    }

    /// Create a single or recurring event after confirmation
    pub async fn create_event(
        &self,
        summary: &str,
        start_time: &str,
        end_time: Option<&str>,
        location: Option<&str>,
        recurrence_rule: Option<&str>,
    ) -> String {
        match self.propose_create(summary, start_time, end_time, location, recurrence_rule) {
            Ok(proposal) => self.confirm_and_commit(proposal).await,
            Err(message) => message,
        }
    }

    /// Delete one event (or a whole series, given its master id) after confirmation
    pub async fn delete_event_by_id(&self, event_id: &str) -> String {
        match self.propose_delete_by_id(event_id) {
            Ok(proposal) => self.confirm_and_commit(proposal).await,
            Err(message) => message,
        }
    }

    /// Find upcoming events matching `query` and delete them, each series once
    pub async fn find_and_delete_events_by_summary(&self, query: &str) -> String {
        match self.propose_delete_matching(query).await {
            Ok(Some(proposal)) => self.confirm_and_commit(proposal).await,
            Ok(None) => format!("No upcoming events found matching summary '{}'.", query),
            Err(e) => format!("Error finding and deleting events: {}", e),
        }
    }

    /// List every calendar visible to the session
    pub async fn list_all_calendars(&self) -> String {
        let calendars = match self.fetch_calendars().await {
            Ok(calendars) => calendars,
            Err(e) => return format!("Error listing calendars: {}", e),
        };

        if calendars.is_empty() {
            return "No calendars found on the user's account.".to_string();
        }

        let mut output = String::from("Accessible Calendars:\n");
        for calendar in calendars {
            let is_primary = if calendar.primary { " (PRIMARY)" } else { "" };
            output.push_str(&format!(
                "- Name: {}{}\n  ID: {}\n",
                calendar.summary.as_deref().unwrap_or("(unnamed)"),
                is_primary,
                calendar.id
            ));
        }
        output
    }

    /// Current time in the configured timezone, `YYYY-MM-DDTHH:MM:SS`
    pub fn get_current_datetime(&self) -> String {
        current_datetime(self.timezone)
    }

    /// Validate arguments and build the insert body
    pub fn propose_create(
        &self,
        summary: &str,
        start_time: &str,
        end_time: Option<&str>,
        location: Option<&str>,
        recurrence_rule: Option<&str>,
    ) -> Result<ProposedAction, String> {
        let summary = summary.trim();
        if summary.is_empty() {
            return Err("Invalid summary: the event title must not be empty.".to_string());
        }

        let start = parse_local_timestamp(start_time).ok_or_else(|| {
            format!(
                "Invalid start_time '{}': expected YYYY-MM-DDTHH:MM:SS without a timezone offset.",
                start_time
            )
        })?;

        let end = match non_empty(end_time) {
            Some(end_time) => parse_local_timestamp(end_time).ok_or_else(|| {
                format!(
                    "Invalid end_time '{}': expected YYYY-MM-DDTHH:MM:SS without a timezone offset.",
                    end_time
                )
            })?,
            None => default_end_time(&start),
        };

        let time_zone = self.timezone.name();
        Ok(ProposedAction::AddEvent(NewEvent {
            summary: summary.to_string(),
            location: non_empty(location).map(str::to_string),
            start: EventTime::local(format_local_timestamp(&start), time_zone),
            end: EventTime::local(format_local_timestamp(&end), time_zone),
            recurrence: non_empty(recurrence_rule).map(|rule| vec![normalize_recurrence(rule)]),
            reminders: Reminders::default(),
        }))
    }

    pub fn propose_delete_by_id(&self, event_id: &str) -> Result<ProposedAction, String> {
        let event_id = event_id.trim();
        if event_id.is_empty() {
            return Err("Invalid event_id: it must not be empty.".to_string());
        }
        Ok(ProposedAction::DeleteEvent {
            event_id: event_id.to_string(),
        })
    }

    /// Search upcoming events and collapse them to delete targets.
    ///
    /// Returns `None` when nothing matches.
    pub async fn propose_delete_matching(
        &self,
        query: &str,
    ) -> Result<Option<ProposedAction>, ProviderError> {
        let instances = self.search_upcoming(query).await?;
        if instances.is_empty() {
            return Ok(None);
        }

        let targets = unique_master_ids(&instances);
        debug!(
            matched = instances.len(),
            targets = targets.len(),
            "Prepared deletion for query '{}'",
            query
        );

        Ok(Some(ProposedAction::DeleteMatching {
            query: query.to_string(),
            instances,
            targets,
        }))
    }

    /// Carry out an approved action
    pub async fn commit(&self, action: ProposedAction) -> String {
        match action {
            ProposedAction::AddEvent(event) => self.insert_event(&event).await,
            ProposedAction::DeleteEvent { event_id } => match self.delete_event(&event_id).await {
                Ok(()) => format!("Event with ID '{}' has been successfully deleted.", event_id),
                Err(e) => format!("Error deleting event with ID '{}': {}", event_id, e),
            },
            ProposedAction::DeleteMatching { query, targets, .. } => {
                self.delete_targets(&query, &targets).await
            }
        }
    }

    async fn confirm_and_commit(&self, action: ProposedAction) -> String {
        if !self.gate.confirm(&action.description()) {
            info!("Action declined by operator");
            return CANCELLED_MESSAGE.to_string();
        }
        self.commit(action).await
    }

    async fn insert_event(&self, event: &NewEvent) -> String {
        let result = async {
            let url = self.url(&["calendars", self.calendar_id.as_str(), "events"])?;
            let request = self.authorized(Method::POST, url).await?.json(event);
            let body = self.send(request).await?;
            decode::<CalendarEvent>(&body)
        }
        .await;

        match result {
            Ok(created) => {
                info!("Created event {}", created.id);
                format!(
                    "Event '{}' successfully created. Check link: {}",
                    created.summary.as_deref().unwrap_or(&event.summary),
                    created.html_link.as_deref().unwrap_or("(no link returned)")
                )
            }
            Err(ProviderError::Http { status, body }) => {
                warn!("Event insert failed with HTTP {}", status);
                format!("API FAILURE (HTTP {}): {}", status, body)
            }
            Err(e) => format!("API FAILURE ({}): {}", failure_kind(&e), e),
        }
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), ProviderError> {
        let url = self.url(&["calendars", self.calendar_id.as_str(), "events", event_id])?;
        let request = self.authorized(Method::DELETE, url).await?;
        self.send(request).await?;
        info!("Deleted event {}", event_id);
        Ok(())
    }

    async fn delete_targets(&self, query: &str, targets: &[String]) -> String {
        let mut failures = Vec::new();
        for target in targets {
            if let Err(e) = self.delete_event(target).await {
                warn!("Failed to delete {}: {}", target, e);
                failures.push(format!("{} ({})", target, e));
            }
        }

        if failures.is_empty() {
            format!(
                "Successfully deleted events or event series matching '{}'.",
                query
            )
        } else {
            format!(
                "Deleted {} of {} events or event series matching '{}'. Failed: {}",
                targets.len() - failures.len(),
                targets.len(),
                query,
                failures.join("; ")
            )
        }
    }

    async fn search_upcoming(&self, query: &str) -> Result<Vec<CalendarEvent>, ProviderError> {
        let time_min = search_lower_bound(self.timezone, Utc::now());
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(&["calendars", self.calendar_id.as_str(), "events"])?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs
                    .append_pair("q", query)
                    .append_pair("timeMin", &time_min)
                    .append_pair("singleEvents", "true")
                    .append_pair("orderBy", "startTime");
                if let Some(token) = &page_token {
                    pairs.append_pair("pageToken", token);
                }
            }

            let request = self.authorized(Method::GET, url).await?;
            let page: EventList = decode(&self.send(request).await?)?;
            events.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Search for '{}' matched {} instance(s)", query, events.len());
        Ok(events)
    }

    async fn fetch_calendars(&self) -> Result<Vec<CalendarListEntry>, ProviderError> {
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.url(&["users", "me", "calendarList"])?;
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            let request = self.authorized(Method::GET, url).await?;
            let page: CalendarList = decode(&self.send(request).await?)?;
            calendars.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(calendars)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| ProviderError::Transport(format!("invalid API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Transport("API base URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, ProviderError> {
        let session = self
            .sessions
            .session()
            .await
            .map_err(|e| ProviderError::Session(e.to_string()))?;
        Ok(self
            .client
            .request(method, url)
            .header(AUTHORIZATION, session.bearer()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Decode(e.to_string()))
}

fn failure_kind(error: &ProviderError) -> &'static str {
    match error {
        ProviderError::Http { .. } => "HTTP",
        ProviderError::Transport(_) => "transport",
        ProviderError::Session(_) => "authorization",
        ProviderError::Decode(_) => "response",
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accept a bare rule such as `FREQ=WEEKLY;BYDAY=TH` as well as a full `RRULE:` line
fn normalize_recurrence(rule: &str) -> String {
    if rule.contains(':') {
        rule.to_string()
    } else {
        format!("RRULE:{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::google_calendar::token::AuthenticatedSession;
    use crate::config::{Config, FileSettings};

    struct NeverAsked;

    impl ConfirmationGate for NeverAsked {
        fn confirm(&self, _description: &str) -> bool {
            panic!("gate must not be consulted");
        }
    }

    fn client() -> CalendarClient {
        let config = Config::from_sources(
            |key| (key == "GOOGLE_API_KEY").then(|| "key".to_string()),
            FileSettings::default(),
        )
        .unwrap();
        CalendarClient::new(
            &config,
            Arc::new(AuthenticatedSession::new("token")),
            Arc::new(NeverAsked),
        )
    }

    #[test]
    fn test_propose_create_defaults_end_time() {
        let action = client()
            .propose_create("Supervision", "2025-03-10T14:00:00", None, Some("Room B6"), None)
            .unwrap();
        let ProposedAction::AddEvent(event) = action else {
            panic!("expected an insert");
        };
        assert_eq!(event.start.date_time.as_deref(), Some("2025-03-10T14:00:00"));
        assert_eq!(event.end.date_time.as_deref(), Some("2025-03-10T15:00:00"));
        assert_eq!(event.end.time_zone.as_deref(), Some("Europe/London"));
        assert_eq!(event.location.as_deref(), Some("Room B6"));
    }

    #[test]
    fn test_propose_create_empty_end_time_defaults() {
        let action = client()
            .propose_create("Lecture", "2025-03-10T09:00", Some(""), Some(""), Some(" "))
            .unwrap();
        let ProposedAction::AddEvent(event) = action else {
            panic!("expected an insert");
        };
        assert_eq!(event.end.date_time.as_deref(), Some("2025-03-10T10:00:00"));
        assert!(event.location.is_none());
        assert!(event.recurrence.is_none());
    }

    #[test]
    fn test_propose_create_rejects_bad_timestamps() {
        let message = client()
            .propose_create("Lecture", "tomorrow 9am", None, None, None)
            .unwrap_err();
        assert!(message.starts_with("Invalid start_time 'tomorrow 9am'"));

        let message = client()
            .propose_create("Lecture", "2025-03-10T09:00:00", Some("2025-03-10T10:00:00+01:00"), None, None)
            .unwrap_err();
        assert!(message.starts_with("Invalid end_time"));
    }

    #[test]
    fn test_recurrence_normalized() {
        let action = client()
            .propose_create("Physics", "2025-03-13T10:00:00", None, None, Some("FREQ=WEEKLY;BYDAY=TH"))
            .unwrap();
        let ProposedAction::AddEvent(event) = action else {
            panic!("expected an insert");
        };
        assert_eq!(event.recurrence, Some(vec!["RRULE:FREQ=WEEKLY;BYDAY=TH".to_string()]));

        assert_eq!(normalize_recurrence("RRULE:FREQ=DAILY"), "RRULE:FREQ=DAILY");
    }

    #[test]
    fn test_propose_delete_by_id_requires_id() {
        assert!(client().propose_delete_by_id("  ").is_err());
        assert_eq!(
            client().propose_delete_by_id("abc").unwrap(),
            ProposedAction::DeleteEvent {
                event_id: "abc".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_input_skips_gate() {
        // NeverAsked panics if consulted
        let message = client().create_event("", "2025-03-10T09:00:00", None, None, None).await;
        assert!(message.starts_with("Invalid summary"));
    }

    #[test]
    fn test_url_building() {
        let client = client();
        let url = client.url(&["calendars", "team@group.calendar.google.com", "events"]).unwrap();
        assert_eq!(
            url.path(),
            "/calendar/v3/calendars/team@group.calendar.google.com/events"
        );
    }
}
