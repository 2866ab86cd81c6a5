use serde::{Deserialize, Serialize};

/// Severity tag carried on toast events, mirrored by the dashboard UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastStatus {
    Success,
    Info,
    Warning,
    Error,
}

/// Running counters for one import run. The invariant
/// `imported + skipped + failed == total` holds at every event boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: u64,
    pub skipped: u64,
    pub failed: u64,
    pub total: u64,
}

/// Progress event emitted during a streamed import: one JSON object per
/// line over the chunked response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImportEvent {
    Toast {
        status: ToastStatus,
        message: String,
    },
    Summary {
        #[serde(flatten)]
        summary: ImportSummary,
    },
}

impl ImportEvent {
    pub fn toast(status: ToastStatus, message: impl Into<String>) -> Self {
        Self::Toast {
            status,
            message: message.into(),
        }
    }

    pub fn summary(summary: ImportSummary) -> Self {
        Self::Summary { summary }
    }

    /// Wire encoding: compact JSON terminated by a newline.
    pub fn to_ndjson_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".into());
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toast_serializes_with_type_tag() {
        let line = ImportEvent::toast(ToastStatus::Success, "Imported Lake Bled Day Trip")
            .to_ndjson_line();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["type"], "toast");
        assert_eq!(value["status"], "success");
        assert!(line.ends_with('\n'));
        assert!(!line.trim_end().contains('\n'));
    }

    #[test]
    fn summary_serializes_flat_counters() {
        let event = ImportEvent::summary(ImportSummary {
            imported: 0,
            skipped: 1,
            failed: 0,
            total: 1,
        });
        let value: serde_json::Value =
            serde_json::from_str(event.to_ndjson_line().trim_end()).unwrap();
        assert_eq!(value["type"], "summary");
        assert_eq!(value["imported"], 0);
        assert_eq!(value["skipped"], 1);
        assert_eq!(value["total"], 1);
    }

    #[test]
    fn events_round_trip() {
        let event = ImportEvent::toast(ToastStatus::Error, "CDN upload failed");
        let parsed: ImportEvent =
            serde_json::from_str(event.to_ndjson_line().trim_end()).unwrap();
        assert_eq!(parsed, event);
    }
}
