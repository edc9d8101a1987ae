use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{NovaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMemory {
    #[serde(default)]
    pub info: Map<String, Value>,
    #[serde(default)]
    pub conversation: Vec<Turn>,
}

impl UserMemory {
    pub fn push_turn(&mut self, role: Role, text: impl Into<String>) {
        self.conversation.push(Turn {
            role,
            text: text.into(),
        });
    }

    pub fn merge_info(&mut self, info: &Map<String, Value>) {
        for (key, value) in info {
            self.info.insert(key.clone(), value.clone());
        }
    }
}

/// Per-user conversation memory, one JSON file per user under the data dir.
/// Records are loaded lazily, kept resident afterwards and rewritten as a
/// whole on every save.
pub struct MemoryStore {
    dir: PathBuf,
    users: RwLock<HashMap<String, UserMemory>>,
}

impl MemoryStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            NovaError::Persistence(format!("could not create data dir {}: {e}", dir.display()))
        })?;
        Ok(Self {
            dir,
            users: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the user's record, reading it from disk on first access. A
    /// missing or unreadable file yields a fresh empty record.
    pub async fn load(&self, user_id: &str) -> UserMemory {
        if let Some(memory) = self.users.read().await.get(user_id) {
            return memory.clone();
        }
        let memory = self.read_file(user_id).await;
        self.users
            .write()
            .await
            .entry(user_id.to_string())
            .or_insert(memory)
            .clone()
    }

    /// Replaces the resident record and rewrites the user's file. The resident
    /// copy is updated even when the disk write fails, so the conversation
    /// keeps flowing for the lifetime of the process.
    pub async fn save(&self, user_id: &str, memory: UserMemory) -> Result<()> {
        let path = self.file_path(user_id);
        let json = serde_json::to_vec_pretty(&memory)
            .map_err(|e| NovaError::Persistence(format!("memory encode failed: {e}")))?;
        self.users
            .write()
            .await
            .insert(user_id.to_string(), memory);
        tokio::fs::write(&path, json).await.map_err(|e| {
            NovaError::Persistence(format!("memory write failed for {}: {e}", path.display()))
        })?;
        Ok(())
    }

    async fn read_file(&self, user_id: &str) -> UserMemory {
        let path = self.file_path(user_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(memory) => memory,
                Err(err) => {
                    warn!(
                        "memory file {} is corrupt, starting fresh: {err}",
                        path.display()
                    );
                    UserMemory::default()
                }
            },
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!(
                        "memory file {} is unreadable, starting fresh: {err}",
                        path.display()
                    );
                }
                UserMemory::default()
            }
        }
    }

    fn file_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("user_{}.json", sanitize_user_id(user_id)))
    }
}

/// Keeps user-supplied ids from escaping the data dir when they are
/// interpolated into file names.
fn sanitize_user_id(user_id: &str) -> String {
    let cleaned: String = user_id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}
