use std::fs;
use std::path::Path;

use cv_core::{Entry, Host};

use crate::error::{Result, StoreError};
use crate::json_bridge::{parse_chat_jsonl, to_chat_jsonl};
use crate::store::Store;

pub const DB_FILE: &str = "chats.db";

struct ActiveChat {
    id: i64,
    name: String,
    entries: Vec<Entry>,
}

/// The host side of the tracker: one open database plus the chat currently
/// in view, with its transcript cached in memory.
///
/// Opening the session is the readiness point. The active chat selected in
/// an earlier run is restored once, here, before any trigger runs.
pub struct ChatSession {
    store: Store,
    chat: Option<ActiveChat>,
    refreshes: u64,
}

impl ChatSession {
    pub fn new(store: Store) -> Result<Self> {
        let mut session = Self {
            store,
            chat: None,
            refreshes: 0,
        };
        if let Some(id) = session.store.active_chat()? {
            session.load_chat(id)?;
        }
        Ok(session)
    }

    /// Open `<base_dir>/chats.db`, creating the directory as needed.
    pub fn open(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", base_dir.display()))
        })?;
        Self::new(Store::open(&base_dir.join(DB_FILE))?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Store::open_in_memory()?)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn chat_name(&self) -> Option<&str> {
        self.chat.as_ref().map(|c| c.name.as_str())
    }

    /// Cached transcript of the active chat; empty when none is open.
    pub fn entries(&self) -> &[Entry] {
        self.chat.as_ref().map(|c| c.entries.as_slice()).unwrap_or(&[])
    }

    /// Number of refreshes issued since the session was opened.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    fn load_chat(&mut self, id: i64) -> Result<()> {
        let name = self
            .store
            .chat_name(id)?
            .ok_or_else(|| StoreError::NotFound(format!("chat {id}")))?;
        let entries = self.store.load_transcript(id)?;
        tracing::info!("opened chat '{name}' ({} messages)", entries.len());
        self.store.set_active_chat(id)?;
        self.chat = Some(ActiveChat { id, name, entries });
        Ok(())
    }

    fn active(&mut self) -> Result<&mut ActiveChat> {
        self.chat.as_mut().ok_or(StoreError::NoActiveChat)
    }

    /// Make `name` the active chat. With `create`, a missing chat is created;
    /// without it, a missing chat is an error. Returns whether it was created.
    pub fn switch_chat(&mut self, name: &str, create: bool) -> Result<bool> {
        let (id, created) = match self.store.find_chat(name)? {
            Some(id) => (id, false),
            None if create => (self.store.create_chat(name)?, true),
            None => return Err(StoreError::NotFound(format!("chat '{name}'"))),
        };
        self.load_chat(id)?;
        Ok(created)
    }

    /// Append an entry to the active chat, returning its index.
    pub fn append(&mut self, entry: Entry) -> Result<usize> {
        let id = self.active()?.id;
        let index = self.store.append_message(id, &entry)?;
        self.active()?.entries.push(entry);
        Ok(index)
    }

    /// Replace the text of entry `index` in the active chat.
    pub fn edit(&mut self, index: usize, text: &str) -> Result<()> {
        let chat = self.active()?;
        let id = chat.id;
        let Some(entry) = chat.entries.get_mut(index) else {
            return Err(StoreError::NotFound(format!("message {index}")));
        };
        entry.text = text.to_string();
        self.store.update_message_text(id, index, text)
    }

    /// Import a JSONL chat log as chat `name`, replacing any messages it
    /// already had, and make it active. Returns the number of entries.
    pub fn import_jsonl(&mut self, name: &str, content: &str) -> Result<usize> {
        let entries = parse_chat_jsonl(content)?;
        let id = match self.store.find_chat(name)? {
            Some(id) => id,
            None => self.store.create_chat(name)?,
        };
        self.store.replace_transcript(id, &entries)?;
        self.load_chat(id)?;
        Ok(entries.len())
    }

    /// Import from a file; the chat is named after the file stem unless
    /// `name` is given.
    pub fn import_jsonl_file(&mut self, path: &Path, name: Option<&str>) -> Result<usize> {
        let content = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        let name = name
            .map(str::to_string)
            .or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "imported".to_string());
        self.import_jsonl(&name, &content)
    }

    pub fn export_jsonl(&self) -> Result<String> {
        let chat = self.chat.as_ref().ok_or(StoreError::NoActiveChat)?;
        to_chat_jsonl(&chat.entries)
    }

    pub fn export_jsonl_file(&self, path: &Path) -> Result<()> {
        let jsonl = self.export_jsonl()?;
        fs::write(path, jsonl).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }
}

impl Host for ChatSession {
    fn transcript(&mut self) -> Option<&mut [Entry]> {
        self.chat.as_mut().map(|c| c.entries.as_mut_slice())
    }

    /// Persist the rewritten newest entry. Storage failures are logged and
    /// never reach the tracker.
    fn refresh(&mut self) {
        self.refreshes += 1;
        let Some(chat) = &self.chat else {
            return;
        };
        let Some(last) = chat.entries.last() else {
            return;
        };
        let index = chat.entries.len() - 1;
        if let Err(e) = self.store.update_message_text(chat.id, index, &last.text) {
            tracing::error!("failed to persist refreshed message {index}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::{Trigger, VariableTracker};
    use tempfile::TempDir;

    fn session_with_chat() -> ChatSession {
        let mut session = ChatSession::open_in_memory().unwrap();
        session.switch_chat("main", true).unwrap();
        session
    }

    #[test]
    fn test_no_chat_means_no_transcript() {
        let mut session = ChatSession::open_in_memory().unwrap();
        assert!(session.transcript().is_none());
        assert!(session.entries().is_empty());
        assert!(matches!(
            session.append(Entry::user("x")),
            Err(StoreError::NoActiveChat)
        ));
    }

    #[test]
    fn test_switch_requires_create_for_missing_chat() {
        let mut session = ChatSession::open_in_memory().unwrap();
        assert!(matches!(
            session.switch_chat("nope", false),
            Err(StoreError::NotFound(_))
        ));
        assert!(session.switch_chat("nope", true).unwrap());
        assert!(!session.switch_chat("nope", false).unwrap());
        assert_eq!(session.chat_name(), Some("nope"));
    }

    #[test]
    fn test_append_and_edit_persist() {
        let mut session = session_with_chat();
        assert_eq!(session.append(Entry::assistant("{{x = 1}}")).unwrap(), 0);
        session.edit(0, "{{x = 2}}").unwrap();

        let id = session.store().find_chat("main").unwrap().unwrap();
        assert_eq!(
            session.store().load_transcript(id).unwrap(),
            vec![Entry::assistant("{{x = 2}}")]
        );
        assert!(matches!(session.edit(3, "x"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_refresh_persists_substituted_text() {
        let mut session = session_with_chat();
        session.append(Entry::assistant("{{hp = 7}}")).unwrap();
        session.append(Entry::assistant("hp is {{get hp}}")).unwrap();

        let mut tracker = VariableTracker::new();
        let outcome = tracker.handle(Trigger::EntryReceived, &mut session);

        assert!(outcome.refreshed);
        assert_eq!(session.refresh_count(), 1);
        let id = session.store().find_chat("main").unwrap().unwrap();
        assert_eq!(session.store().load_transcript(id).unwrap()[1].text, "hp is 7");
    }

    #[test]
    fn test_active_chat_restored_on_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut session = ChatSession::open(dir.path()).unwrap();
            session.switch_chat("a", true).unwrap();
            session.switch_chat("b", true).unwrap();
            session.append(Entry::assistant("{{gold = 3}}")).unwrap();
        }
        let session = ChatSession::open(dir.path()).unwrap();
        assert_eq!(session.chat_name(), Some("b"));
        assert_eq!(session.entries(), &[Entry::assistant("{{gold = 3}}")]);
    }

    #[test]
    fn test_import_replaces_and_activates() {
        let mut session = session_with_chat();
        let jsonl = "{\"is_user\":true,\"mes\":\"hi\"}\n{\"is_user\":false,\"mes\":\"{{x += 2}}\"}\n";
        assert_eq!(session.import_jsonl("log", jsonl).unwrap(), 2);
        assert_eq!(session.chat_name(), Some("log"));
        assert_eq!(session.import_jsonl("log", jsonl).unwrap(), 2);
        assert_eq!(session.entries().len(), 2);

        let exported = session.export_jsonl().unwrap();
        assert_eq!(parse_chat_jsonl(&exported).unwrap(), session.entries());
    }

    #[test]
    fn test_import_file_named_after_stem() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adventure.jsonl");
        fs::write(&path, "{\"mes\":\"{{x = 1}}\"}\n").unwrap();

        let mut session = ChatSession::open_in_memory().unwrap();
        session.import_jsonl_file(&path, None).unwrap();
        assert_eq!(session.chat_name(), Some("adventure"));
    }
}
