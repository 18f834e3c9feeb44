//! Behavioral events emitted by the client SDK.
//!
//! The vocabulary mirrors what the embedded element instruments: views,
//! scroll dynamics, click quality, hover, visibility, forms, and navigation.
//! A subset fires at mouse-move frequency and is throttled server-side as
//! defense in depth; see [`EventName::min_interval_ms`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

use crate::domain::foundation::{
    BusinessId, ComponentId, GlobalUid, SessionId, Timestamp, UserId,
};

/// Property key carrying how many throttled occurrences were folded into
/// one stored event.
pub const COALESCED_COUNT_PROPERTY: &str = "coalesced_count";

/// Names of behavioral events accepted by the ingest surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    // Core funnel
    PageViewed,
    ComponentViewed,
    ScrollDepthReached,
    TimeOnComponent,
    Click,
    Backtrack,
    AddToCart,
    ConversionCompleted,
    VariantShown,

    // Mouse tracking
    MouseHesitation,
    MouseIdleStart,
    MouseIdleEnd,

    // Scroll tracking
    ScrollDirectionChange,
    ScrollFast,
    ScrollPause,

    // Click quality
    RageClick,
    DeadClick,
    RightClick,
    DoubleClick,

    // Hover tracking
    Hover,
    HoverEnd,

    // Visibility tracking
    TabHidden,
    TabVisible,
    WindowBlur,
    WindowFocus,

    // Form tracking
    FieldFocus,
    FieldBlur,
    FieldPaste,
    FormSubmit,

    // Navigation tracking
    FirstInteraction,
    PageExitIntent,
    ExternalLinkClick,
    BackNavigation,

    // Product tracking
    ProductClick,
}

impl EventName {
    /// Minimum interval between stored occurrences for high-frequency
    /// events, or `None` for events stored unconditionally.
    ///
    /// Intervals range from 500 ms (hesitation bursts) to 5 s (idle
    /// markers), matching what the client-side throttle already enforces.
    pub fn min_interval_ms(&self) -> Option<u64> {
        match self {
            EventName::MouseHesitation => Some(500),
            EventName::DeadClick => Some(500),
            EventName::ScrollDirectionChange => Some(750),
            EventName::ScrollFast => Some(1_000),
            EventName::ScrollPause => Some(1_000),
            EventName::Hover => Some(1_000),
            EventName::HoverEnd => Some(1_000),
            EventName::MouseIdleStart => Some(5_000),
            EventName::MouseIdleEnd => Some(5_000),
            _ => None,
        }
    }

    /// True for the throttle-class events, which are also the first to be
    /// shed under write-queue back-pressure.
    pub fn is_high_frequency(&self) -> bool {
        self.min_interval_ms().is_some()
    }

    /// True for events that signal explicit conversion intent.
    pub fn is_conversion_signal(&self) -> bool {
        matches!(
            self,
            EventName::AddToCart | EventName::ConversionCompleted | EventName::FormSubmit
        )
    }

    /// Minimum interval as a `Duration`, when throttled.
    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval_ms().map(Duration::from_millis)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // serde's snake_case rename is the canonical wire form
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        write!(f, "{}", s)
    }
}

/// A single behavioral event, tenant-scoped and append-only once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub business_id: BusinessId,
    pub user_id: UserId,
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_uid: Option<GlobalUid>,
    pub event_name: EventName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<ComponentId>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub timestamp: Timestamp,
}

impl Event {
    /// Creates an event stamped with the given receipt time.
    pub fn new(
        business_id: BusinessId,
        user_id: UserId,
        session_id: SessionId,
        event_name: EventName,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            business_id,
            user_id,
            session_id,
            global_uid: None,
            event_name,
            component_id: None,
            properties: Map::new(),
            timestamp,
        }
    }

    /// Sets the component this event relates to.
    pub fn with_component(mut self, component_id: ComponentId) -> Self {
        self.component_id = Some(component_id);
        self
    }

    /// Sets the cross-site identifier, when the client supplied one.
    pub fn with_global_uid(mut self, global_uid: Option<GlobalUid>) -> Self {
        self.global_uid = global_uid;
        self
    }

    /// Adds a free-form property.
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Reads a numeric property, if present.
    pub fn numeric_property(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }

    /// How many raw occurrences this stored event represents (1 unless the
    /// throttle folded suppressed occurrences into it).
    pub fn coalesced_count(&self) -> u64 {
        self.numeric_property(COALESCED_COUNT_PROPERTY)
            .map(|n| n.max(1.0) as u64)
            .unwrap_or(1)
    }
}
