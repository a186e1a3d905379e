//! Conversation transcript and its durable JSON export.
//!
//! A [`Transcript`] only grows: entries are appended, never reordered or
//! edited, and the only way to shrink it is [`Transcript::reset`]. Exports
//! are written as one pretty-printed document per flush under
//! `conversation_<YYYY-MM-DD_HH-MM-SS>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use crate::domain::message::{Message, MessageContent};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("message {index} has unsupported content: {reason}")]
    UnsupportedContent { index: usize, reason: &'static str },
    #[error("could not serialize conversation: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("could not write conversation file `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

/// Writes transcripts into a directory of timestamped JSON documents.
#[derive(Clone, Debug)]
pub struct TranscriptExporter {
    directory: PathBuf,
}

impl TranscriptExporter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into() }
    }

    pub fn export(&self, transcript: &Transcript) -> Result<PathBuf, ExportError> {
        self.export_at(transcript, Local::now())
    }

    pub fn export_at(
        &self,
        transcript: &Transcript,
        timestamp: DateTime<Local>,
    ) -> Result<PathBuf, ExportError> {
        let document = normalize_transcript(transcript)?;
        let rendered = serde_json::to_string_pretty(&document)?;

        fs::create_dir_all(&self.directory)
            .map_err(|source| ExportError::Io { path: self.directory.clone(), source })?;

        let path = self.available_path(&timestamp.format("%Y-%m-%d_%H-%M-%S").to_string());
        if let Err(source) = fs::write(&path, rendered) {
            error!(
                event_name = "transcript.export.write_failed",
                path = %path.display(),
                message_count = transcript.len(),
                error = %source,
                "failed to write conversation file"
            );
            return Err(ExportError::Io { path, source });
        }

        info!(
            event_name = "transcript.export.written",
            path = %path.display(),
            message_count = transcript.len(),
            "conversation exported"
        );
        Ok(path)
    }

    // Two flushes inside the same second get a numeric suffix instead of
    // overwriting each other.
    fn available_path(&self, stamp: &str) -> PathBuf {
        let base = self.directory.join(format!("conversation_{stamp}.json"));
        if !base.exists() {
            return base;
        }
        (1..)
            .map(|suffix| self.directory.join(format!("conversation_{stamp}_{suffix}.json")))
            .find(|candidate| !candidate.exists())
            .unwrap_or(base)
    }
}

pub fn normalize_transcript(transcript: &Transcript) -> Result<Value, ExportError> {
    let messages = transcript
        .messages()
        .iter()
        .enumerate()
        .map(|(index, message)| normalize_message(index, message))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(messages))
}

fn normalize_message(index: usize, message: &Message) -> Result<Value, ExportError> {
    let content = match message.content() {
        MessageContent::Text(text) => Value::String(text.clone()),
        MessageContent::Parts(parts) if parts.is_empty() => {
            error!(
                event_name = "transcript.export.unsupported_content",
                index,
                role = message.role().as_str(),
                "message carries an empty content sequence"
            );
            return Err(ExportError::UnsupportedContent {
                index,
                reason: "structured content sequence is empty",
            });
        }
        MessageContent::Parts(parts) => Value::Array(
            parts.iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>()?,
        ),
    };

    Ok(json!({ "role": message.role().as_str(), "content": content }))
}

/// Reads an exported document back into messages.
pub fn read_export(path: &Path) -> Result<Vec<Message>, ExportError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ExportError::Io { path: path.to_path_buf(), source })?;
    Ok(serde_json::from_str(&raw)?)
}
