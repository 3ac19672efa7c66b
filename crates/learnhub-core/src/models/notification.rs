use serde::{Deserialize, Serialize};

use crate::utils::format_date;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Notification {
    pub fn created_display(&self) -> String {
        self.created_at
            .as_deref()
            .map(format_date)
            .unwrap_or_default()
    }
}

/// Response of `GET /api/notifications/count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    #[serde(default)]
    pub module_id: Option<i64>,
    pub filename: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

/// Response of a successful attachment upload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedAttachment {
    pub attachment_id: i64,
    pub filename: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
