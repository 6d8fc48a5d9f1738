use std::sync::Arc;

use cv_core::{Entry, Role, Trigger, VariableTracker, display};
use cv_store::{ChatSession, Settings, StoreError};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::settle::Settle;

#[derive(Clone)]
pub struct CvServer {
    state: Arc<Mutex<ServerState>>,
    settle: Settle,
    tool_router: ToolRouter<Self>,
}

struct ServerState {
    session: ChatSession,
    tracker: VariableTracker,
    placeholder: String,
}

impl CvServer {
    /// Build the server around an opened session. The transcript restored
    /// by the session is scanned once so the first `cv_vars` call is current.
    pub fn new(mut session: ChatSession, settings: &Settings) -> Self {
        let mut tracker = VariableTracker::new();
        tracker.handle(Trigger::TranscriptLoaded, &mut session);
        Self {
            state: Arc::new(Mutex::new(ServerState {
                session,
                tracker,
                placeholder: settings.empty_placeholder.clone(),
            })),
            settle: Settle::new(settings.settle_delay()),
            tool_router: Self::tool_router(),
        }
    }

    /// Wait out the settling delay, then take the state lock. A tool makes
    /// its change and runs the trigger under the one guard.
    async fn settled_state(&self) -> MutexGuard<'_, ServerState> {
        self.settle.wait().await;
        self.state.lock().await
    }
}

impl ServerState {
    fn run(&mut self, trigger: Trigger) -> serde_json::Value {
        let outcome = self.tracker.handle(trigger, &mut self.session);
        serde_json::json!({
            "trigger": trigger,
            "chat": self.session.chat_name(),
            "outcome": outcome,
            "variables": display::to_json(self.tracker.store()),
            "display": self.tracker.display(&self.placeholder),
        })
    }
}

fn store_error(e: StoreError) -> McpError {
    match e {
        StoreError::NotFound(_) | StoreError::NoActiveChat | StoreError::InvalidData(_) => {
            McpError::invalid_params(e.to_string(), None)
        }
        StoreError::Sqlite(_) => McpError::internal_error(e.to_string(), None),
    }
}

fn json_result(value: &serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )])
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct AppendRequest {
    /// Message text, possibly containing {{name op value}} and {{get name}} directives
    text: String,
    /// Author role: "assistant" (default) or "user". Only assistant messages are scanned.
    role: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EditRequest {
    /// Zero-based index of the message in the active chat
    index: usize,
    /// Replacement text
    text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SwitchRequest {
    /// Chat name
    name: String,
    /// Create the chat if it does not exist
    create: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ImportRequest {
    /// Name of the chat to import into (replaced if it exists)
    name: String,
    /// Chat log as JSON Lines with `is_user` and `mes` fields
    jsonl: String,
}

#[tool_router]
impl CvServer {
    #[tool(
        description = "Append a message to the active chat. Recomputes all variables from the transcript, then replaces {{get name}} directives in this message with current values (unknown variables become 0). Returns the final message text and the variable table."
    )]
    async fn cv_append(
        &self,
        Parameters(req): Parameters<AppendRequest>,
    ) -> Result<CallToolResult, McpError> {
        let role = match req.role.as_deref() {
            None => Role::Assistant,
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|e| McpError::invalid_params(e, None))?,
        };

        let mut state = self.settled_state().await;
        let index = state
            .session
            .append(Entry::new(role, req.text))
            .map_err(store_error)?;
        let mut result = state.run(Trigger::EntryReceived);
        result["index"] = serde_json::json!(index);
        result["text"] = serde_json::json!(state.session.entries().get(index).map(|e| &e.text));
        Ok(json_result(&result))
    }

    #[tool(
        description = "Replace the text of a message in the active chat and recompute variables. Retrieval directives in the edited message are not substituted."
    )]
    async fn cv_edit(
        &self,
        Parameters(req): Parameters<EditRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.settled_state().await;
        state
            .session
            .edit(req.index, &req.text)
            .map_err(store_error)?;
        let result = state.run(Trigger::EntryEdited);
        Ok(json_result(&result))
    }

    #[tool(description = "Switch to another chat (optionally creating it) and recompute variables from its transcript.")]
    async fn cv_switch(
        &self,
        Parameters(req): Parameters<SwitchRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.settled_state().await;
        let created = state
            .session
            .switch_chat(&req.name, req.create.unwrap_or(false))
            .map_err(store_error)?;
        let mut result = state.run(Trigger::TranscriptSwitched);
        result["created"] = serde_json::json!(created);
        Ok(json_result(&result))
    }

    #[tool(description = "Import a JSONL chat log as a chat, make it active, and recompute variables.")]
    async fn cv_import(
        &self,
        Parameters(req): Parameters<ImportRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.settled_state().await;
        let imported = state
            .session
            .import_jsonl(&req.name, &req.jsonl)
            .map_err(store_error)?;
        let mut result = state.run(Trigger::TranscriptLoaded);
        result["imported"] = serde_json::json!(imported);
        Ok(json_result(&result))
    }

    #[tool(description = "Show the current variable table for the active chat.")]
    async fn cv_vars(&self) -> Result<CallToolResult, McpError> {
        let state = self.state.lock().await;
        let result = serde_json::json!({
            "chat": state.session.chat_name(),
            "variables": display::to_json(state.tracker.store()),
            "display": state.tracker.display(&state.placeholder),
        });
        Ok(json_result(&result))
    }

    #[tool(description = "List the messages of the active chat in order.")]
    async fn cv_transcript(&self) -> Result<CallToolResult, McpError> {
        let state = self.state.lock().await;
        let result = serde_json::json!({
            "chat": state.session.chat_name(),
            "entries": state.session.entries(),
        });
        Ok(json_result(&result))
    }
}

#[tool_handler]
impl ServerHandler for CvServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Tracks numeric story variables across a chat transcript.\n\n\
                 DIRECTIVES (assistant messages only):\n\
                 - {{name = 5}}, {{name += 1}}, {{name -= 2}} set or adjust a variable.\n\
                 - {{get name}} is replaced with the current value when the message is appended.\n\n\
                 Variables are always rebuilt from the whole transcript, so editing or \
                 switching chats never leaves stale values behind."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
