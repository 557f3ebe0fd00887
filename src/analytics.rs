//! Analytics sink: the one capability the funnel uses to report events.
//!
//! Emission is fire-and-forget: the trait returns nothing, so a broken or
//! slow sink can never change funnel state.

use std::sync::Mutex;

use serde_json::{Map, Value};

/// Free-form event attributes.
pub type Props = Map<String, Value>;

/// Build a [`Props`] map from a `serde_json::json!` object literal.
///
/// Non-object values yield an empty map.
pub fn props(value: Value) -> Props {
    match value {
        Value::Object(map) => map,
        _ => Props::new(),
    }
}

/// Receiver of funnel analytics events.
pub trait AnalyticsSink: Send + Sync {
    /// A named event with attributes.
    fn track(&self, event: &str, props: Props);

    /// A page view.
    fn page_view(&self, page: &str, props: Props);

    /// Associate a user id with profile attributes.
    fn identify(&self, user_id: &str, props: Props);

    /// A button click, reported as a `Button Clicked` event.
    fn button_click(&self, button: &str, mut props: Props) {
        props.insert("button_name".into(), Value::String(button.to_string()));
        self.track("Button Clicked", props);
    }

    /// A form lifecycle event, reported as `Form {action}`.
    fn form_event(&self, action: &str, form: &str, mut props: Props) {
        props.insert("form_name".into(), Value::String(form.to_string()));
        self.track(&format!("Form {action}"), props);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn track(&self, _event: &str, _props: Props) {}
    fn page_view(&self, _page: &str, _props: Props) {}
    fn identify(&self, _user_id: &str, _props: Props) {}
}

/// Logs every event through `tracing` under the `analytics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn track(&self, event: &str, props: Props) {
        let props = Value::Object(props);
        tracing::info!(target: "analytics", event, props = %props, "track");
    }

    fn page_view(&self, page: &str, props: Props) {
        let props = Value::Object(props);
        tracing::info!(target: "analytics", page, props = %props, "page_view");
    }

    fn identify(&self, user_id: &str, props: Props) {
        let props = Value::Object(props);
        tracing::info!(target: "analytics", user_id, props = %props, "identify");
    }
}

/// One event captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    Track { event: String, props: Props },
    PageView { page: String, props: Props },
    Identify { user_id: String, props: Props },
}

impl RecordedEvent {
    /// Event or page name; the user id for identify calls.
    pub fn name(&self) -> &str {
        match self {
            Self::Track { event, .. } => event,
            Self::PageView { page, .. } => page,
            Self::Identify { user_id, .. } => user_id,
        }
    }

    pub fn props(&self) -> &Props {
        match self {
            Self::Track { props, .. }
            | Self::PageView { props, .. }
            | Self::Identify { props, .. } => props,
        }
    }
}

/// Keeps every event in memory. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Names of the `track` events, in order.
    pub fn tracked(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Track { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Most recent `track` event with this name.
    pub fn last(&self, name: &str) -> Option<RecordedEvent> {
        self.events()
            .into_iter()
            .rev()
            .find(|e| matches!(e, RecordedEvent::Track { event, .. } if event == name))
    }

    fn push(&self, event: RecordedEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl AnalyticsSink for RecordingSink {
    fn track(&self, event: &str, props: Props) {
        self.push(RecordedEvent::Track {
            event: event.to_string(),
            props,
        });
    }

    fn page_view(&self, page: &str, props: Props) {
        self.push(RecordedEvent::PageView {
            page: page.to_string(),
            props,
        });
    }

    fn identify(&self, user_id: &str, props: Props) {
        self.push(RecordedEvent::Identify {
            user_id: user_id.to_string(),
            props,
        });
    }
}
