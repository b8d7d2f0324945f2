use std::fmt;
use url::Url;

use crate::models::{AccountId, ValidationError};

pub const PERMISSION_DENIED_MESSAGE: &str = "Camera permission denied. Please allow camera access.";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Cannot handle {event} while intake is {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    #[error("Scanner is not active")]
    NotScanning,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Lifecycle of a scanning front end.
///
/// `Idle -> AwaitingPermission -> Active`, with `Error <-> Retrying` for
/// recoverable failures. `Active` keeps emitting identifiers until stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeState {
    Idle,
    AwaitingPermission,
    Active,
    Error(String),
    Retrying,
}

impl IntakeState {
    fn name(&self) -> &'static str {
        match self {
            IntakeState::Idle => "idle",
            IntakeState::AwaitingPermission => "awaiting permission",
            IntakeState::Active => "active",
            IntakeState::Error(_) => "in error",
            IntakeState::Retrying => "retrying",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeEvent {
    Start,
    PermissionGranted,
    PermissionDenied,
    DeviceFailed(String),
    Retry,
    Stop,
}

impl IntakeEvent {
    fn name(&self) -> &'static str {
        match self {
            IntakeEvent::Start => "start",
            IntakeEvent::PermissionGranted => "permission granted",
            IntakeEvent::PermissionDenied => "permission denied",
            IntakeEvent::DeviceFailed(_) => "device failure",
            IntakeEvent::Retry => "retry",
            IntakeEvent::Stop => "stop",
        }
    }
}

/// Identifies one verification request. Only the most recently issued ticket
/// is current; results carrying an older ticket are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Last-request-wins bookkeeping by generation number.
#[derive(Debug, Default)]
pub struct RequestGeneration {
    latest: u64,
}

impl RequestGeneration {
    pub fn issue(&mut self) -> Ticket {
        self.latest += 1;
        Ticket(self.latest)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest
    }

    /// Passes `result` through only if `ticket` has not been superseded.
    pub fn accept<T>(&self, ticket: Ticket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            tracing::debug!(
                ticket = %ticket,
                latest = self.latest,
                "Discarding result of superseded request"
            );
            None
        }
    }
}

/// Front door for identifiers: manual entry and scanner events both go through
/// here and each accepted identifier gets a fresh [`Ticket`].
#[derive(Debug)]
pub struct CredentialIntake {
    state: IntakeState,
    generation: RequestGeneration,
}

impl Default for CredentialIntake {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialIntake {
    pub fn new() -> Self {
        Self {
            state: IntakeState::Idle,
            generation: RequestGeneration::default(),
        }
    }

    pub fn state(&self) -> &IntakeState {
        &self.state
    }

    pub fn apply(&mut self, event: IntakeEvent) -> Result<&IntakeState, IntakeError> {
        let next = match (&self.state, event) {
            (_, IntakeEvent::Stop) => IntakeState::Idle,
            (IntakeState::Idle, IntakeEvent::Start) => IntakeState::AwaitingPermission,
            (
                IntakeState::AwaitingPermission | IntakeState::Retrying,
                IntakeEvent::PermissionGranted,
            ) => IntakeState::Active,
            (
                IntakeState::AwaitingPermission | IntakeState::Retrying,
                IntakeEvent::PermissionDenied,
            ) => IntakeState::Error(PERMISSION_DENIED_MESSAGE.to_string()),
            (
                IntakeState::AwaitingPermission | IntakeState::Active | IntakeState::Retrying,
                IntakeEvent::DeviceFailed(message),
            ) => IntakeState::Error(format!("Failed to start scanner: {}", message)),
            (IntakeState::Error(_), IntakeEvent::Retry) => IntakeState::Retrying,
            (state, event) => {
                return Err(IntakeError::InvalidTransition {
                    state: state.name(),
                    event: event.name(),
                })
            }
        };

        tracing::debug!(from = self.state.name(), to = next.name(), "Intake state change");
        self.state = next;
        Ok(&self.state)
    }

    /// Manual entry. Accepted in any scanner state.
    pub fn submit(&mut self, input: &str) -> Result<(Ticket, AccountId), IntakeError> {
        let account = AccountId::parse(input)?;
        Ok((self.generation.issue(), account))
    }

    /// A decoded QR payload from the scanner. Only accepted while `Active`.
    pub fn scan(&mut self, payload: &str) -> Result<(Ticket, AccountId), IntakeError> {
        if self.state != IntakeState::Active {
            return Err(IntakeError::NotScanning);
        }
        let account = account_from_payload(payload)?;
        Ok((self.generation.issue(), account))
    }

    pub fn accept<T>(&self, ticket: Ticket, result: T) -> Option<T> {
        self.generation.accept(ticket, result)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.is_current(ticket)
    }
}

/// Extracts the account from a scanned payload.
///
/// Verification QR codes encode a URL such as
/// `https://verisite.io/verify/<account>`; anything that is not an http(s) URL
/// is taken as the account itself.
pub fn account_from_payload(payload: &str) -> Result<AccountId, ValidationError> {
    let trimmed = payload.trim();

    if let Ok(url) = Url::parse(trimmed) {
        if matches!(url.scheme(), "http" | "https") {
            let segments: Vec<&str> = url
                .path_segments()
                .map(|s| s.filter(|seg| !seg.is_empty()).collect())
                .unwrap_or_default();

            let account = segments
                .iter()
                .position(|seg| *seg == "verify")
                .and_then(|i| segments.get(i + 1))
                .or_else(|| segments.last())
                .copied()
                .unwrap_or("");

            return AccountId::parse(account);
        }
    }

    AccountId::parse(trimmed)
}
