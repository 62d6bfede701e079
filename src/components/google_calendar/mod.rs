//! Google Calendar v3 access: credentials, consent and the calendar operations.

pub mod actions;
pub mod client;
pub mod models;
pub mod oauth;
pub mod token;

pub use actions::ProposedAction;
pub use client::{CalendarClient, ProviderError};
pub use models::CalendarEvent;
pub use token::{AuthenticatedSession, CredentialManager, SessionProvider};
