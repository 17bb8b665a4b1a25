use care_rota::workflows::scheduling::ClockTime;
use care_rota::workflows::staffing::{
    Notification, NotificationError, NotificationPublisher, NotificationTopic,
};
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Notification sink for the in-process deployment: every event is logged and kept so clients
/// polling through the API (or the demo) can inspect what was sent.
#[derive(Default, Clone)]
pub(crate) struct RecordingNotifications {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationPublisher for RecordingNotifications {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            topic = ?notification.topic,
            recipient = ?notification.recipient,
            subject = %notification.subject_id,
            "notification queued"
        );
        let mut guard = self
            .events
            .lock()
            .map_err(|_| NotificationError::Transport("notification log poisoned".to_string()))?;
        guard.push(notification);
        Ok(())
    }
}

impl RecordingNotifications {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, topic: NotificationTopic) -> usize {
        self.events()
            .iter()
            .filter(|event| event.topic == topic)
            .count()
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_clock(raw: &str) -> Result<ClockTime, String> {
    ClockTime::from_str(raw).map_err(|err| err.to_string())
}

pub(crate) fn parse_money(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim())
        .map_err(|err| format!("failed to parse '{raw}' as a decimal ({err})"))
}
