use serde::{Deserialize, Serialize};
use volley_core::{ConfigFile, Progress, Report};

/// Frames sent by the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub(crate) enum ClientMessage {
    Run { data: Box<ConfigFile> },
    Cancel,
}

impl ClientMessage {
    pub(crate) fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Frames sent by the server.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub(crate) enum ServerFrame {
    Progress { data: String },
    Done { data: Box<Report> },
    Error { error: String },
}

impl ServerFrame {
    pub(crate) fn progress(p: &Progress) -> Self {
        Self::Progress {
            data: p.to_string(),
        }
    }

    pub(crate) fn error(message: impl std::fmt::Display) -> Self {
        Self::Error {
            error: message.to_string(),
        }
    }

    pub(crate) fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
