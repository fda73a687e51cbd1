use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use payremind_core::{ConfigurationId, DomainResult, Identity, ValidationError};
use payremind_events::Event;

use crate::template::{DEFAULT_BILLING_TEMPLATE, DEFAULT_REMINDER_TEMPLATE};
use crate::window::SendWindow;

/// Lead time applied when an owner has not chosen one.
pub const DEFAULT_DAYS_BEFORE_REMINDER: u32 = 3;

/// Upper bound for the reminder lead time, in days.
pub const MAX_DAYS_BEFORE_REMINDER: u32 = 30;

/// Check a reminder lead time coming from untyped input.
pub fn validate_reminder_days(days: i64) -> Result<u32, ValidationError> {
    u32::try_from(days)
        .ok()
        .filter(|d| *d <= MAX_DAYS_BEFORE_REMINDER)
        .ok_or(ValidationError::InvalidReminderDays {
            min: 0,
            max: MAX_DAYS_BEFORE_REMINDER,
            got: days,
        })
}

/// Tunable part of a reminder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSettings {
    pub days_before_reminder: u32,
    /// Body template for pre-due reminders; empty means the built-in default.
    pub reminder_template: String,
    /// Body template for overdue billing notices; empty means the built-in default.
    pub billing_template: String,
    /// Handle of the owner's finance contact, quoted in messages.
    pub finance_contact: String,
    pub auto_send_enabled: bool,
    pub send_window: SendWindow,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            days_before_reminder: DEFAULT_DAYS_BEFORE_REMINDER,
            reminder_template: String::new(),
            billing_template: String::new(),
            finance_contact: String::new(),
            auto_send_enabled: true,
            send_window: SendWindow::default(),
        }
    }
}

impl ReminderSettings {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_reminder_days(i64::from(self.days_before_reminder))?;
        Ok(())
    }
}

/// Entity: per-owner reminder configuration.
///
/// One configuration exists per owner; that uniqueness is enforced by the
/// store (upsert keyed by `owner_id`), not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderConfiguration {
    identity: Identity<ConfigurationId>,
    owner_id: String,
    settings: ReminderSettings,
}

impl ReminderConfiguration {
    /// New configuration for `owner_id` with default settings:
    /// 3 days lead time, `08:00`–`18:00` window, auto-send enabled.
    pub fn create(
        owner_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<(Self, ConfigurationEvent)> {
        Self::create_with(owner_id, ReminderSettings::default(), now)
    }

    /// New configuration with explicit settings.
    pub fn create_with(
        owner_id: impl Into<String>,
        settings: ReminderSettings,
        now: DateTime<Utc>,
    ) -> DomainResult<(Self, ConfigurationEvent)> {
        let owner_id = owner_id.into();
        if owner_id.is_empty() {
            return Err(ValidationError::OwnerRequired.into());
        }
        settings.validate()?;

        let configuration = Self {
            identity: Identity::new(ConfigurationId::new(), now),
            owner_id,
            settings,
        };
        let event = ConfigurationEvent::ConfigurationCreated(ConfigurationCreated {
            configuration_id: configuration.id(),
            owner_id: configuration.owner_id.clone(),
            settings: configuration.settings.clone(),
            occurred_at: now,
        });
        Ok((configuration, event))
    }

    /// Rehydrate a configuration loaded from storage.
    pub fn restore(
        identity: Identity<ConfigurationId>,
        owner_id: String,
        settings: ReminderSettings,
    ) -> DomainResult<Self> {
        if owner_id.is_empty() {
            return Err(ValidationError::OwnerRequired.into());
        }
        settings.validate()?;
        Ok(Self {
            identity,
            owner_id,
            settings,
        })
    }

    pub fn id(&self) -> ConfigurationId {
        self.identity.id()
    }

    pub fn identity(&self) -> &Identity<ConfigurationId> {
        &self.identity
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn settings(&self) -> &ReminderSettings {
        &self.settings
    }

    pub fn days_before_reminder(&self) -> u32 {
        self.settings.days_before_reminder
    }

    pub fn send_window(&self) -> SendWindow {
        self.settings.send_window
    }

    pub fn finance_contact(&self) -> &str {
        &self.settings.finance_contact
    }

    pub fn auto_send_enabled(&self) -> bool {
        self.settings.auto_send_enabled
    }

    /// Configured reminder template, or the built-in one when unset.
    pub fn reminder_template(&self) -> &str {
        non_empty_or(&self.settings.reminder_template, DEFAULT_REMINDER_TEMPLATE)
    }

    /// Configured billing template, or the built-in one when unset.
    pub fn billing_template(&self) -> &str {
        non_empty_or(&self.settings.billing_template, DEFAULT_BILLING_TEMPLATE)
    }

    /// Whether `now` is inside the configured sending window.
    ///
    /// The wall-clock time is read in the zone of `now`; pass a zoned instant
    /// when the owner does not work in UTC.
    pub fn is_within_send_window<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.settings.send_window.contains(now)
    }

    /// Automatic sending is enabled and `now` is inside the window.
    pub fn is_auto_send_allowed<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.settings.auto_send_enabled && self.is_within_send_window(now)
    }

    pub fn set_days_before_reminder(
        &mut self,
        days: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<ConfigurationEvent> {
        validate_reminder_days(i64::from(days))?;
        self.settings.days_before_reminder = days;
        Ok(self.updated(now))
    }

    pub fn set_send_window(
        &mut self,
        start: &str,
        end: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<ConfigurationEvent> {
        self.settings.send_window = SendWindow::parse(start, end)?;
        Ok(self.updated(now))
    }

    pub fn set_templates(
        &mut self,
        reminder_template: impl Into<String>,
        billing_template: impl Into<String>,
        now: DateTime<Utc>,
    ) -> ConfigurationEvent {
        self.settings.reminder_template = reminder_template.into();
        self.settings.billing_template = billing_template.into();
        self.updated(now)
    }

    pub fn set_finance_contact(
        &mut self,
        finance_contact: impl Into<String>,
        now: DateTime<Utc>,
    ) -> ConfigurationEvent {
        self.settings.finance_contact = finance_contact.into();
        self.updated(now)
    }

    pub fn enable_auto_send(&mut self, now: DateTime<Utc>) -> ConfigurationEvent {
        self.settings.auto_send_enabled = true;
        self.updated(now)
    }

    pub fn disable_auto_send(&mut self, now: DateTime<Utc>) -> ConfigurationEvent {
        self.settings.auto_send_enabled = false;
        self.updated(now)
    }

    fn updated(&mut self, now: DateTime<Utc>) -> ConfigurationEvent {
        self.identity.touch(now);
        ConfigurationEvent::ConfigurationUpdated(ConfigurationUpdated {
            configuration_id: self.id(),
            owner_id: self.owner_id.clone(),
            settings: self.settings.clone(),
            occurred_at: now,
        })
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// Event: ConfigurationCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationCreated {
    pub configuration_id: ConfigurationId,
    pub owner_id: String,
    pub settings: ReminderSettings,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ConfigurationUpdated (carries the full settings after the change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationUpdated {
    pub configuration_id: ConfigurationId,
    pub owner_id: String,
    pub settings: ReminderSettings,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationEvent {
    ConfigurationCreated(ConfigurationCreated),
    ConfigurationUpdated(ConfigurationUpdated),
}

impl Event for ConfigurationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ConfigurationEvent::ConfigurationCreated(_) => "reminders.configuration.created",
            ConfigurationEvent::ConfigurationUpdated(_) => "reminders.configuration.updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ConfigurationEvent::ConfigurationCreated(e) => e.occurred_at,
            ConfigurationEvent::ConfigurationUpdated(e) => e.occurred_at,
        }
    }

    fn aggregate_type(&self) -> &'static str {
        "reminder_configuration"
    }

    fn aggregate_id(&self) -> String {
        match self {
            ConfigurationEvent::ConfigurationCreated(e) => e.configuration_id.to_string(),
            ConfigurationEvent::ConfigurationUpdated(e) => e.configuration_id.to_string(),
        }
    }
}
