//! The fixed set of calendar tools offered to the model.
//!
//! Declarations are static. Every call the model makes is checked against
//! them before anything runs; a call that does not fit is answered with an
//! error string instead of reaching the calendar.

use crate::components::google_calendar::CalendarClient;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Declaration of one tool; all parameters are strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

pub const CREATE_EVENT: &str = "create_event";
pub const FIND_AND_DELETE_EVENTS_BY_SUMMARY: &str = "find_and_delete_events_by_summary";
pub const DELETE_EVENT_BY_ID: &str = "delete_event_by_id";
pub const LIST_ALL_CALENDARS: &str = "list_all_calendars";
pub const GET_CURRENT_DATETIME: &str = "get_current_datetime";

pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: CREATE_EVENT,
        description: "Creates a new event in the calendar. Asks the user for confirmation first. \
                      Supports one-off and recurring events.",
        params: &[
            ParamSpec {
                name: "summary",
                description: "Title of the event.",
                required: true,
            },
            ParamSpec {
                name: "start_time",
                description: "Local start time in the format YYYY-MM-DDTHH:MM:SS, without offset.",
                required: true,
            },
            ParamSpec {
                name: "end_time",
                description: "Local end time in the format YYYY-MM-DDTHH:MM:SS. \
                              Defaults to one hour after the start.",
                required: false,
            },
            ParamSpec {
                name: "location",
                description: "Where the event takes place.",
                required: false,
            },
            ParamSpec {
                name: "recurrence_rule",
                description: "RFC 5545 rule for repeating events, e.g. \
                              'RRULE:FREQ=WEEKLY;BYDAY=MO;COUNT=10'.",
                required: false,
            },
        ],
    },
    ToolSpec {
        name: FIND_AND_DELETE_EVENTS_BY_SUMMARY,
        description: "Searches upcoming events whose text matches the query and deletes them \
                      after the user confirms. A recurring series is deleted as a whole.",
        params: &[ParamSpec {
            name: "summary_query",
            description: "Text to search for in event titles, e.g. 'Team sync'.",
            required: true,
        }],
    },
    ToolSpec {
        name: DELETE_EVENT_BY_ID,
        description: "Deletes a single event, or a whole series when given its master id. \
                      Asks the user for confirmation first.",
        params: &[ParamSpec {
            name: "event_id",
            description: "Calendar event id.",
            required: true,
        }],
    },
    ToolSpec {
        name: LIST_ALL_CALENDARS,
        description: "Lists every calendar the user can access with its name and id.",
        params: &[],
    },
    ToolSpec {
        name: GET_CURRENT_DATETIME,
        description: "Returns the current local date and time. Call this before resolving \
                      relative dates like 'tomorrow' or 'next Monday'.",
        params: &[],
    },
];

impl ToolSpec {
    /// Function declaration in the shape Gemini expects
    pub fn declaration(&self) -> Value {
        let mut declaration = json!({
            "name": self.name,
            "description": self.description,
        });

        if !self.params.is_empty() {
            let properties: Map<String, Value> = self
                .params
                .iter()
                .map(|param| {
                    (
                        param.name.to_string(),
                        json!({"type": "STRING", "description": param.description}),
                    )
                })
                .collect();
            let required: Vec<&str> = self
                .params
                .iter()
                .filter(|param| param.required)
                .map(|param| param.name)
                .collect();

            declaration["parameters"] = json!({
                "type": "OBJECT",
                "properties": properties,
                "required": required,
            });
        }

        declaration
    }

    /// Check `args` against the declaration and collect the string values
    fn validate(&self, args: &Value) -> Result<HashMap<&'static str, String>, String> {
        let empty = Map::new();
        let object = match args {
            Value::Null => &empty,
            Value::Object(object) => object,
            other => return Err(format!("arguments must be an object, got {}", other)),
        };

        if let Some(unknown) = object
            .keys()
            .find(|key| !self.params.iter().any(|param| param.name == key.as_str()))
        {
            return Err(format!("unknown parameter '{}'", unknown));
        }

        let mut values = HashMap::new();
        for param in self.params {
            match object.get(param.name) {
                Some(Value::String(value)) if !value.trim().is_empty() => {
                    values.insert(param.name, value.clone());
                }
                None | Some(Value::Null) | Some(Value::String(_)) => {
                    if param.required {
                        return Err(format!("missing required parameter '{}'", param.name));
                    }
                }
                Some(_) => return Err(format!("parameter '{}' must be a string", param.name)),
            }
        }
        Ok(values)
    }
}

/// Look up a declared tool by name
pub fn find(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|tool| tool.name == name)
}

/// All declarations, in declaration order
pub fn declarations() -> Vec<Value> {
    TOOLS.iter().map(ToolSpec::declaration).collect()
}

/// A validated tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    CreateEvent {
        summary: String,
        start_time: String,
        end_time: Option<String>,
        location: Option<String>,
        recurrence_rule: Option<String>,
    },
    FindAndDeleteEventsBySummary {
        summary_query: String,
    },
    DeleteEventById {
        event_id: String,
    },
    ListAllCalendars,
    GetCurrentDatetime,
}

impl ToolInvocation {
    /// Validate a model's call. The error is the message handed back to the model.
    pub fn parse(name: &str, args: &Value) -> Result<Self, String> {
        let spec = find(name).ok_or_else(|| format!("Unknown tool '{}'.", name))?;
        let mut values = spec
            .validate(args)
            .map_err(|e| format!("Invalid call to tool '{}': {}.", name, e))?;

        // validate() guarantees required keys are present
        let mut take = |key: &str| values.remove(key);
        let invocation = match spec.name {
            CREATE_EVENT => ToolInvocation::CreateEvent {
                summary: take("summary").unwrap_or_default(),
                start_time: take("start_time").unwrap_or_default(),
                end_time: take("end_time"),
                location: take("location"),
                recurrence_rule: take("recurrence_rule"),
            },
            FIND_AND_DELETE_EVENTS_BY_SUMMARY => ToolInvocation::FindAndDeleteEventsBySummary {
                summary_query: take("summary_query").unwrap_or_default(),
            },
            DELETE_EVENT_BY_ID => ToolInvocation::DeleteEventById {
                event_id: take("event_id").unwrap_or_default(),
            },
            LIST_ALL_CALENDARS => ToolInvocation::ListAllCalendars,
            _ => ToolInvocation::GetCurrentDatetime,
        };
        Ok(invocation)
    }
}

/// Runs validated tool calls
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, invocation: ToolInvocation) -> String;
}

#[async_trait]
impl ToolExecutor for CalendarClient {
    async fn execute(&self, invocation: ToolInvocation) -> String {
        match invocation {
            ToolInvocation::CreateEvent {
                summary,
                start_time,
                end_time,
                location,
                recurrence_rule,
            } => {
                self.create_event(
                    &summary,
                    &start_time,
                    end_time.as_deref(),
                    location.as_deref(),
                    recurrence_rule.as_deref(),
                )
                .await
            }
            ToolInvocation::FindAndDeleteEventsBySummary { summary_query } => {
                self.find_and_delete_events_by_summary(&summary_query).await
            }
            ToolInvocation::DeleteEventById { event_id } => self.delete_event_by_id(&event_id).await,
            ToolInvocation::ListAllCalendars => self.list_all_calendars().await,
            ToolInvocation::GetCurrentDatetime => self.get_current_datetime(),
        }
    }
}

/// Validate and run one call; never fails, the model always gets a string back
pub async fn dispatch(executor: &dyn ToolExecutor, name: &str, args: &Value) -> String {
    match ToolInvocation::parse(name, args) {
        Ok(invocation) => {
            info!(tool = name, "Running tool");
            executor.execute(invocation).await
        }
        Err(message) => {
            warn!(tool = name, "Rejected tool call: {}", message);
            message
        }
    }
}
