use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use gamedex_core::transcript::{ExportError, Transcript, TranscriptExporter};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

pub type SharedTranscript = Arc<Mutex<Transcript>>;

/// Named conversation sessions. Each transcript has its own lock so turns in
/// one session serialize without blocking the others.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SharedTranscript>>,
}

#[derive(Debug)]
pub struct FlushReport {
    pub session_id: String,
    pub message_count: usize,
    pub result: Result<PathBuf, ExportError>,
}

impl SessionStore {
    pub async fn session(&self, session_id: &str) -> SharedTranscript {
        if let Some(existing) = self.sessions.read().await.get(session_id) {
            return existing.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.to_string()).or_default().clone()
    }

    pub async fn existing(&self, session_id: &str) -> Option<SharedTranscript> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Clears one session's transcript, drops it from the store and returns
    /// how many messages it held.
    pub async fn reset(&self, session_id: &str) -> usize {
        let Some(transcript) = self.sessions.write().await.remove(session_id) else {
            return 0;
        };
        let mut transcript = transcript.lock().await;
        let cleared = transcript.len();
        transcript.reset();
        info!(event_name = "session.reset", session_id, cleared, "session transcript cleared");
        cleared
    }

    /// Exports every non-empty session. A failing session does not stop the
    /// others from being written.
    pub async fn flush_all(&self, exporter: &TranscriptExporter) -> Vec<FlushReport> {
        let mut sessions = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, transcript)| (id.clone(), transcript.clone()))
            .collect::<Vec<_>>();
        sessions.sort_by(|left, right| left.0.cmp(&right.0));

        let mut reports = Vec::new();
        for (session_id, transcript) in sessions {
            let transcript = transcript.lock().await;
            if transcript.is_empty() {
                continue;
            }

            let result = exporter.export(&transcript);
            if let Err(export_error) = &result {
                error!(
                    event_name = "session.flush.failed",
                    session_id = %session_id,
                    error = %export_error,
                    "session could not be exported"
                );
            }
            reports.push(FlushReport { session_id, message_count: transcript.len(), result });
        }
        reports
    }
}
