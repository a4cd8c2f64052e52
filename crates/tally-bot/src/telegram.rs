//! Minimal Telegram Bot API client and webhook update types.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tally_core::{MediaKind, ReplySink, TallyError};

const API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects longer messages.
const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error in {method}: {description}")]
    Api { method: String, description: String },

    #[error("file download failed with status {0}")]
    Download(u16),
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    /// All sizes of one photo, smallest first.
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    /// Absent when the file is too large for bots to download.
    pub file_path: Option<String>,
}

/// The file a message carries, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_id: String,
    pub file_name: Option<String>,
    /// `None` for documents that are neither an image nor a PDF.
    pub kind: Option<MediaKind>,
}

impl Message {
    /// The document if there is one, else the largest photo size.
    pub fn attachment(&self) -> Option<Attachment> {
        if let Some(doc) = &self.document {
            let kind = doc
                .file_name
                .as_deref()
                .and_then(MediaKind::from_file_name)
                .or_else(|| doc.mime_type.as_deref().and_then(MediaKind::from_mime));
            return Some(Attachment {
                file_id: doc.file_id.clone(),
                file_name: doc.file_name.clone(),
                kind,
            });
        }

        self.photo.last().map(|p| Attachment {
            file_id: p.file_id.clone(),
            file_name: None,
            kind: Some(MediaKind::Image),
        })
    }
}

pub struct TelegramClient {
    http: Client,
    token: String,
    api_base: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        TelegramClient {
            http: Client::new(),
            token: token.into(),
            api_base: API_BASE.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let resp: ApiResponse<T> = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        match resp.result {
            Some(result) if resp.ok => Ok(result),
            _ => Err(TelegramError::Api {
                method: method.to_string(),
                description: resp.description.unwrap_or_else(|| "no result".to_string()),
            }),
        }
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TelegramError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                serde_json::json!({
                    "chat_id": chat_id,
                    "text": truncate_message(text),
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", serde_json::json!({ "file_id": file_id }))
            .await
    }

    pub async fn download(&self, file_path: &str) -> Result<Vec<u8>, TelegramError> {
        let url = format!("{}/file/bot{}/{}", self.api_base, self.token, file_path);
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(TelegramError::Download(resp.status().as_u16()));
        }
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn set_webhook(&self, url: &str) -> Result<(), TelegramError> {
        let _: bool = self
            .call("setWebhook", serde_json::json!({ "url": url }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReplySink for TelegramClient {
    async fn send_reply(&self, chat: &str, text: &str) -> Result<(), TallyError> {
        self.send_message(chat, text)
            .await
            .map_err(|e| TallyError::Delivery(e.to_string()))
    }
}

fn truncate_message(text: &str) -> &str {
    match text.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_photo_uses_largest_size() {
        let u = update(
            r#"{"update_id": 1, "message": {"message_id": 5, "chat": {"id": 42},
                "photo": [
                    {"file_id": "small", "width": 90, "height": 60},
                    {"file_id": "large", "width": 1280, "height": 853}
                ]}}"#,
        );
        let msg = u.message.unwrap();
        assert_eq!(msg.chat.id, 42);
        let a = msg.attachment().unwrap();
        assert_eq!(a.file_id, "large");
        assert_eq!(a.kind, Some(MediaKind::Image));
    }

    #[test]
    fn test_pdf_document() {
        let u = update(
            r#"{"update_id": 2, "message": {"message_id": 6, "chat": {"id": 7},
                "from": {"id": 7, "username": "crew"},
                "document": {"file_id": "doc1", "file_name": "roster.pdf", "mime_type": "application/pdf"}}}"#,
        );
        let a = u.message.unwrap().attachment().unwrap();
        assert_eq!(a.file_id, "doc1");
        assert_eq!(a.file_name.as_deref(), Some("roster.pdf"));
        assert_eq!(a.kind, Some(MediaKind::Pdf));
    }

    #[test]
    fn test_document_kind_from_mime() {
        let u = update(
            r#"{"update_id": 3, "message": {"message_id": 1, "chat": {"id": 1},
                "document": {"file_id": "d", "mime_type": "image/jpeg"}}}"#,
        );
        assert_eq!(u.message.unwrap().attachment().unwrap().kind, Some(MediaKind::Image));
    }

    #[test]
    fn test_unsupported_document() {
        let u = update(
            r#"{"update_id": 4, "message": {"message_id": 1, "chat": {"id": 1},
                "document": {"file_id": "d", "file_name": "hours.xlsx"}}}"#,
        );
        assert_eq!(u.message.unwrap().attachment().unwrap().kind, None);
    }

    #[test]
    fn test_text_message_has_no_attachment() {
        let u = update(
            r#"{"update_id": 5, "message": {"message_id": 1, "chat": {"id": 1}, "text": "hi"}}"#,
        );
        assert!(u.message.unwrap().attachment().is_none());
    }

    #[test]
    fn test_non_message_update() {
        let u = update(r#"{"update_id": 6, "edited_message": {"message_id": 1}}"#);
        assert!(u.message.is_none());
    }

    #[test]
    fn test_truncate_message() {
        let long = "x".repeat(MAX_MESSAGE_CHARS + 5);
        assert_eq!(truncate_message(&long).len(), MAX_MESSAGE_CHARS);
        assert_eq!(truncate_message("short"), "short");
    }

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new("123:abc");
        assert_eq!(
            client.method_url("getFile"),
            "https://api.telegram.org/bot123:abc/getFile"
        );
    }
}
