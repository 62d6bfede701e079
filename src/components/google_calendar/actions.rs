use super::models::{CalendarEvent, NewEvent};
use std::collections::HashSet;
use std::fmt::Write;

const HEADER: &str = "--- CONFIRMATION REQUIRED ---";
const FOOTER: &str = "----------------------------";

/// A calendar change awaiting confirmation.
///
/// Produced by the `propose_*` methods of the client and carried out by
/// `CalendarClient::commit` once the gate approves its description.
#[derive(Debug, Clone, PartialEq)]
pub enum ProposedAction {
    AddEvent(NewEvent),
    DeleteEvent {
        event_id: String,
    },
    DeleteMatching {
        query: String,
        /// Every matched instance, shown to the operator
        instances: Vec<CalendarEvent>,
        /// Unique master ids, each deleted once
        targets: Vec<String>,
    },
}

impl ProposedAction {
    /// Human-readable summary shown by the confirmation gate
    pub fn description(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n{}", HEADER);

        match self {
            ProposedAction::AddEvent(event) => {
                let _ = writeln!(out, "Action: + ADD Event");
                let _ = writeln!(out, "Summary: {}", event.summary);
                let _ = writeln!(out, "Time: {} to {}", event.start.display(), event.end.display());
                let _ = writeln!(out, "Location: {}", event.location.as_deref().unwrap_or("None"));
                let _ = writeln!(
                    out,
                    "Recurrence: {}",
                    event
                        .recurrence
                        .as_ref()
                        .map(|rules| rules.join("; "))
                        .unwrap_or_else(|| "None".to_string())
                );
            }
            ProposedAction::DeleteEvent { event_id } => {
                let _ = writeln!(out, "Action: - DELETE Event");
                let _ = writeln!(out, "Event ID: {}", event_id);
            }
            ProposedAction::DeleteMatching {
                query,
                instances,
                targets,
            } => {
                let _ = writeln!(out, "Action: - DELETE Events matching '{}'", query);
                let _ = writeln!(out);
                for event in instances {
                    render_instance(&mut out, event);
                    let _ = writeln!(out);
                }
                let _ = writeln!(
                    out,
                    "{} matched occurrence(s), {} event(s) or series to delete",
                    instances.len(),
                    targets.len()
                );
            }
        }

        out.push_str(FOOTER);
        out
    }
}

fn render_instance(out: &mut String, event: &CalendarEvent) {
    let start = event.start.as_ref().map_or("unknown", |t| t.display());
    let end = event.end.as_ref().map_or("unknown", |t| t.display());
    let recurrence = match (&event.recurrence, &event.recurring_event_id) {
        (Some(rules), _) => rules.join("; "),
        (None, Some(master)) => format!("Part of recurring series {} (whole series)", master),
        (None, None) => "None".to_string(),
    };

    let _ = writeln!(out, "Summary: {}", event.summary_or_default());
    let _ = writeln!(out, "Time: {} to {}", start, end);
    let _ = writeln!(out, "Location: {}", event.location.as_deref().unwrap_or("None"));
    let _ = writeln!(out, "Recurrence: {}", recurrence);
}

/// Master ids of `events` without duplicates, in first-seen order
pub fn unique_master_ids(events: &[CalendarEvent]) -> Vec<String> {
    let mut seen = HashSet::new();
    events
        .iter()
        .map(CalendarEvent::master_id)
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}
