use gridcast_error::{ErrorExt, RouterError, StatusCode};
use thiserror::Error;

/// Ошибка разбора имени канала.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel name is empty")]
    Empty,

    #[error("channel '{channel}' has an empty segment at position {index}")]
    EmptySegment { channel: String, index: usize },

    #[error("channel '{channel}' contains invalid character {ch:?}")]
    InvalidCharacter { channel: String, ch: char },
}

impl ChannelError {
    pub fn channel(&self) -> &str {
        match self {
            Self::Empty => "",
            Self::EmptySegment { channel, .. } | Self::InvalidCharacter { channel, .. } => channel,
        }
    }
}

impl ErrorExt for ChannelError {
    fn status_code(&self) -> StatusCode {
        StatusCode::InvalidChannel
    }
}

impl From<ChannelError> for RouterError {
    fn from(err: ChannelError) -> Self {
        RouterError::InvalidChannel {
            channel: err.channel().to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ChannelError::EmptySegment {
            channel: "A..B".into(),
            index: 1,
        };
        assert_eq!(
            err.to_string(),
            "channel 'A..B' has an empty segment at position 1"
        );
    }

    #[test]
    fn test_into_router_error() {
        let err: RouterError = ChannelError::InvalidCharacter {
            channel: "A B".into(),
            ch: ' ',
        }
        .into();
        match err {
            RouterError::InvalidChannel { channel, reason } => {
                assert_eq!(channel, "A B");
                assert!(reason.contains("' '"));
            }
            other => panic!("Expected InvalidChannel, got {other:?}"),
        }
    }

    #[test]
    fn test_status_code() {
        assert_eq!(ChannelError::Empty.status_code(), StatusCode::InvalidChannel);
        let err: RouterError = ChannelError::Empty.into();
        assert_eq!(err.status_code(), StatusCode::InvalidChannel);
    }
}
