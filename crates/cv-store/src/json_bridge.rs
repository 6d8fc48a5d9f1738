//! Chat log exchange format: JSON Lines, one message per line with
//! `is_user` and `mes` fields. A leading header line (no `mes`) carries
//! chat metadata and is skipped on import.

use cv_core::{Entry, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

const USER_NAME: &str = "User";
const ASSISTANT_NAME: &str = "Assistant";

#[derive(Debug, Serialize, Deserialize)]
struct ChatLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    is_user: bool,
    mes: String,
}

/// Parse a JSONL chat log into transcript entries.
pub fn parse_chat_jsonl(content: &str) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .map_err(|e| StoreError::InvalidData(format!("line {}: {e}", i + 1)))?;
        if value.get("mes").is_none() {
            continue;
        }
        let msg: ChatLine = serde_json::from_value(value)
            .map_err(|e| StoreError::InvalidData(format!("line {}: {e}", i + 1)))?;
        let role = if msg.is_user {
            Role::User
        } else {
            Role::Assistant
        };
        entries.push(Entry::new(role, msg.mes));
    }

    Ok(entries)
}

/// Serialize entries as a JSONL chat log with a header line.
pub fn to_chat_jsonl(entries: &[Entry]) -> Result<String> {
    let header = serde_json::json!({
        "user_name": USER_NAME,
        "character_name": ASSISTANT_NAME,
        "chat_metadata": {},
    });
    let mut out = header.to_string();
    out.push('\n');

    for entry in entries {
        let line = ChatLine {
            name: Some(
                match entry.role {
                    Role::User => USER_NAME,
                    Role::Assistant => ASSISTANT_NAME,
                }
                .to_string(),
            ),
            is_user: !entry.is_assistant(),
            mes: entry.text.clone(),
        };
        let json = serde_json::to_string(&line)
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))?;
        out.push_str(&json);
        out.push('\n');
    }

    Ok(out)
}
