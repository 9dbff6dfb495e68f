use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// User-facing notification produced by a mutation outcome. The UI drains and displays these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub code: String,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn success(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, code, message)
    }

    pub fn info(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, code, message)
    }

    /// Map an error to what the user sees; connectivity problems get guidance instead of the raw text.
    pub fn from_error(err: &AppError) -> Self {
        let message = match err.kind {
            ErrorKind::Network => {
                "No se pudo contactar al servidor. Revise su conexión; se reintentará en la próxima sincronización."
                    .to_string()
            }
            ErrorKind::Authorization => format!("Acceso denegado: {}", err.message),
            ErrorKind::Server if err.retryable => format!("{} (puede reintentar)", err.message),
            _ => err.message.clone(),
        };
        let level = match err.kind {
            ErrorKind::NotFound => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        Self::new(level, err.code.clone(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_become_connectivity_guidance() {
        let n = Notice::from_error(&AppError::network("REMOTE_UNREACHABLE", "connect refused"));
        assert_eq!(n.level, NoticeLevel::Error);
        assert_eq!(n.code, "REMOTE_UNREACHABLE");
        assert!(n.message.contains("conexión"));
    }
}
