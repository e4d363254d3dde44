use crate::protocol::jsonrpc::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `notifications/cancelled`: a previously issued request should be
/// abandoned. The matching pending waiter, if any, is failed locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledNotification {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `notifications/progress` for an in-flight request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressNotification {
    #[serde(rename = "progressToken")]
    pub progress_token: Value,

    pub progress: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `notifications/resources/updated` names a single changed URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdatedNotification {
    pub uri: String,
}

/// Syslog-style severity levels used by `notifications/message`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

/// `notifications/message`: server-side log line forwarded to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingMessageNotification {
    pub level: LoggingLevel,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,

    pub data: Value,
}

impl LoggingMessageNotification {
    /// Forward to the host logger at the closest `tracing` level.
    pub fn emit(&self) {
        let logger = self.logger.as_deref().unwrap_or("server");
        match self.level {
            LoggingLevel::Debug => tracing::debug!(target: "mcp_server", %logger, data = %self.data),
            LoggingLevel::Info | LoggingLevel::Notice => {
                tracing::info!(target: "mcp_server", %logger, data = %self.data)
            }
            LoggingLevel::Warning => {
                tracing::warn!(target: "mcp_server", %logger, data = %self.data)
            }
            LoggingLevel::Error
            | LoggingLevel::Critical
            | LoggingLevel::Alert
            | LoggingLevel::Emergency => {
                tracing::error!(target: "mcp_server", %logger, data = %self.data)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cancelled_notification_accepts_either_id_shape() {
        let by_number: CancelledNotification =
            serde_json::from_value(json!({"requestId": 9})).unwrap();
        assert_eq!(by_number.request_id, RequestId::Number(9));

        let by_string: CancelledNotification =
            serde_json::from_value(json!({"requestId": "r-9", "reason": "superseded"})).unwrap();
        assert_eq!(by_string.request_id, RequestId::from("r-9"));
        assert_eq!(by_string.reason.as_deref(), Some("superseded"));
    }

    #[test]
    fn logging_levels_decode_lowercase() {
        let notification: LoggingMessageNotification = serde_json::from_value(json!({
            "level": "warning",
            "data": "disk nearly full"
        }))
        .unwrap();
        assert_eq!(notification.level, LoggingLevel::Warning);
    }
}
