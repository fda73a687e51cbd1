use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use payremind_core::{ClientId, DomainResult, Identity, ValidationError};
use payremind_events::Event;

/// Minimum number of characters in a client name.
pub const NAME_MIN_CHARS: usize = 3;

static CONTACT_HANDLE_RE: OnceLock<Regex> = OnceLock::new();
static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn contact_handle_regex() -> &'static Regex {
    CONTACT_HANDLE_RE.get_or_init(|| {
        Regex::new(r"^\d{10,15}$")
            .unwrap_or_else(|error| panic!("contact handle regex failed to compile: {error}"))
    })
}

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,4}$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Validated client fields, with an empty email folded into `None`.
struct Details {
    name: String,
    contact_handle: String,
    contact_email: Option<String>,
}

fn validate_details(
    name: String,
    contact_handle: String,
    contact_email: Option<String>,
) -> Result<Details, ValidationError> {
    if name.chars().count() < NAME_MIN_CHARS {
        return Err(ValidationError::NameTooShort {
            min: NAME_MIN_CHARS,
        });
    }

    // `\d` is Unicode-aware in `regex`; the handle is dialled, so ASCII only.
    if !contact_handle.is_ascii() || !contact_handle_regex().is_match(&contact_handle) {
        return Err(ValidationError::InvalidContactHandle);
    }

    let contact_email = contact_email.filter(|email| !email.is_empty());
    if let Some(email) = &contact_email {
        if !email_regex().is_match(email) {
            return Err(ValidationError::InvalidEmail);
        }
    }

    Ok(Details {
        name,
        contact_handle,
        contact_email,
    })
}

/// Entity: Client (the customer an invoice is billed to).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    identity: Identity<ClientId>,
    name: String,
    contact_handle: String,
    contact_email: Option<String>,
    active: bool,
}

impl Client {
    /// Register a new, active client.
    pub fn register(
        name: impl Into<String>,
        contact_handle: impl Into<String>,
        contact_email: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Self, ClientEvent)> {
        let details = validate_details(name.into(), contact_handle.into(), contact_email)?;
        let client = Self {
            identity: Identity::new(ClientId::new(), now),
            name: details.name,
            contact_handle: details.contact_handle,
            contact_email: details.contact_email,
            active: true,
        };

        let event = ClientEvent::ClientRegistered(ClientRegistered {
            client_id: client.id(),
            name: client.name.clone(),
            contact_handle: client.contact_handle.clone(),
            contact_email: client.contact_email.clone(),
            occurred_at: now,
        });
        Ok((client, event))
    }

    /// Rehydrate a client loaded from storage.
    pub fn restore(
        identity: Identity<ClientId>,
        name: String,
        contact_handle: String,
        contact_email: Option<String>,
        active: bool,
    ) -> DomainResult<Self> {
        let details = validate_details(name, contact_handle, contact_email)?;
        Ok(Self {
            identity,
            name: details.name,
            contact_handle: details.contact_handle,
            contact_email: details.contact_email,
            active,
        })
    }

    pub fn id(&self) -> ClientId {
        self.identity.id()
    }

    pub fn identity(&self) -> &Identity<ClientId> {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact_handle(&self) -> &str {
        &self.contact_handle
    }

    pub fn contact_email(&self) -> Option<&str> {
        self.contact_email.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Replace name and contact data. Nothing changes if any field is invalid.
    pub fn update_details(
        &mut self,
        name: impl Into<String>,
        contact_handle: impl Into<String>,
        contact_email: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<ClientEvent> {
        let details = validate_details(name.into(), contact_handle.into(), contact_email)?;
        self.name = details.name;
        self.contact_handle = details.contact_handle;
        self.contact_email = details.contact_email;
        self.identity.touch(now);

        Ok(ClientEvent::ClientDetailsUpdated(ClientDetailsUpdated {
            client_id: self.id(),
            name: self.name.clone(),
            contact_handle: self.contact_handle.clone(),
            contact_email: self.contact_email.clone(),
            occurred_at: now,
        }))
    }

    pub fn activate(&mut self, now: DateTime<Utc>) -> ClientEvent {
        self.active = true;
        self.identity.touch(now);
        ClientEvent::ClientActivated(ClientActivated {
            client_id: self.id(),
            occurred_at: now,
        })
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) -> ClientEvent {
        self.active = false;
        self.identity.touch(now);
        ClientEvent::ClientDeactivated(ClientDeactivated {
            client_id: self.id(),
            occurred_at: now,
        })
    }
}

/// Event: ClientRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistered {
    pub client_id: ClientId,
    pub name: String,
    pub contact_handle: String,
    pub contact_email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientDetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDetailsUpdated {
    pub client_id: ClientId,
    pub name: String,
    pub contact_handle: String,
    pub contact_email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientActivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientActivated {
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDeactivated {
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    ClientRegistered(ClientRegistered),
    ClientDetailsUpdated(ClientDetailsUpdated),
    ClientActivated(ClientActivated),
    ClientDeactivated(ClientDeactivated),
}

impl ClientEvent {
    pub fn client_id(&self) -> ClientId {
        match self {
            ClientEvent::ClientRegistered(e) => e.client_id,
            ClientEvent::ClientDetailsUpdated(e) => e.client_id,
            ClientEvent::ClientActivated(e) => e.client_id,
            ClientEvent::ClientDeactivated(e) => e.client_id,
        }
    }
}

impl Event for ClientEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::ClientRegistered(_) => "clients.client.registered",
            ClientEvent::ClientDetailsUpdated(_) => "clients.client.updated",
            ClientEvent::ClientActivated(_) => "clients.client.activated",
            ClientEvent::ClientDeactivated(_) => "clients.client.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ClientEvent::ClientRegistered(e) => e.occurred_at,
            ClientEvent::ClientDetailsUpdated(e) => e.occurred_at,
            ClientEvent::ClientActivated(e) => e.occurred_at,
            ClientEvent::ClientDeactivated(e) => e.occurred_at,
        }
    }

    fn aggregate_type(&self) -> &'static str {
        "client"
    }

    fn aggregate_id(&self) -> String {
        self.client_id().to_string()
    }
}
