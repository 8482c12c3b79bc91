//! User-facing notifications and error reporting.
//!
//! Failed mutations are published on a broadcast channel for the front end
//! to render, recorded as Sentry breadcrumbs, and server faults are captured
//! as Sentry events.

use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::api::ApiError;

/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Confirmation of a completed action.
    Info,
    /// Background failure the shopper can usually ignore (cart, wishlist).
    Quiet,
    /// Failure on the checkout path that needs attention.
    Error,
}

/// A message for the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    /// Collection or area the message is about (`cart`, `orders`, ...).
    pub source: &'static str,
    pub message: String,
}

/// Broadcasts notifications to any number of subscribers.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Notifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Publish a confirmation.
    pub fn info(&self, source: &'static str, message: impl Into<String>) {
        let message = message.into();
        add_breadcrumb(source, &message, None);
        self.publish(Severity::Info, source, message);
    }

    /// Publish a failed remote call and report it.
    pub fn failure(&self, source: &'static str, action: &str, severity: Severity, err: &ApiError) {
        let detail = err.to_string();
        add_breadcrumb(source, &format!("{action} failed"), Some(&[("error", detail.as_str())]));

        if err.is_server_fault() {
            let event_id = sentry::capture_error(err);
            error!(
                source,
                action,
                error = %err,
                sentry_event_id = %event_id,
                "Remote call failed"
            );
        } else {
            warn!(source, action, error = %err, "Remote call failed");
        }

        self.publish(severity, source, err.user_message());
    }

    fn publish(&self, severity: Severity, source: &'static str, message: String) {
        // No subscribers is fine.
        let _ = self.tx.send(Notification {
            severity,
            source,
            message,
        });
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

/// Tag subsequent Sentry events with the signed-in user.
pub fn set_sentry_user(phone: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(phone.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear user context (on logout).
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
