/// Failures of the studio core. None of them is fatal: every variant is
/// recoverable by the user retrying or changing their input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StudioError {
    #[error("{reason}")]
    Validation { reason: String },

    #[error("generation failed: {message}")]
    GenerationFailed { message: String },

    #[error("persistence failure: {message}")]
    Persistence { message: String },

    #[error("export failed: {message}")]
    Export { message: String },

    #[error("invalid image: {message}")]
    Codec { message: String },

    #[error("{reason}")]
    Unavailable { reason: String },

    #[error("a generation request is already in flight")]
    Busy,

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl StudioError {
    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            message: message.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    /// Keeps the whole `anyhow` context chain in the message.
    pub fn persistence(err: &anyhow::Error) -> Self {
        Self::Persistence {
            message: format!("{err:#}"),
        }
    }
}

pub type StudioResult<T> = Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::StudioError;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            StudioError::unavailable("Select at least 2 materials").to_string(),
            "Select at least 2 materials"
        );
        assert_eq!(
            StudioError::generation("The AI did not return a new image.").to_string(),
            "generation failed: The AI did not return a new image."
        );
    }

    #[test]
    fn persistence_keeps_context_chain() {
        let err = Err::<(), _>(std::io::Error::other("disk full"))
            .context("failed to write materials.json")
            .err()
            .map(|err| StudioError::persistence(&err));
        assert_eq!(
            err.map(|err| err.to_string()).unwrap_or_default(),
            "persistence failure: failed to write materials.json: disk full"
        );
    }
}
