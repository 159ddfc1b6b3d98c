//! Messaging Channel Port

use async_trait::async_trait;
use thiserror::Error;

/// Message size ceiling for chunked list replies: the channel's hard limit
/// (4096 for Telegram) minus a safety margin for headers and markup.
pub const MESSAGE_CHAR_LIMIT: usize = 3800;

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("update poll failed: {0}")]
    Poll(String),

    #[error("messenger configuration error: {0}")]
    Config(String),
}

/// One inbound operator command from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    /// Monotonically increasing update identifier, used for offset acks.
    pub update_id: i64,
    /// Chat the command was sent from.
    pub chat_id: i64,
    /// Raw message text.
    pub text: String,
}

/// Send/receive primitives of the messaging channel.
#[async_trait]
pub trait MessengerPort: Send + Sync {
    /// Deliver one rich-text message. `preview` controls link previews.
    async fn send(&self, text: &str, preview: bool) -> Result<(), MessengerError>;

    /// Fetch inbound messages with update ids greater than `offset`.
    /// The caller advances its offset to the largest id returned.
    async fn poll_commands(&self, offset: i64) -> Result<Vec<InboundCommand>, MessengerError>;
}

/// Accumulate lines into messages that stay under `limit` characters.
/// A line that would push the current buffer over the limit flushes the
/// buffer and starts a new one with that line; an oversized first line is
/// sent as its own (over-long) message rather than dropped.
pub fn chunk_lines<I>(lines: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in lines {
        if current.is_empty() {
            current = line;
        } else if current.len() + line.len() + 1 > limit {
            chunks.push(std::mem::take(&mut current));
            current = line;
        } else {
            current.push('\n');
            current.push_str(&line);
        }
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_empty_input() {
        assert!(chunk_lines(Vec::<String>::new(), 100).is_empty());
    }

    #[test]
    fn test_chunk_single_message() {
        let chunks = chunk_lines(vec!["one".to_string(), "two".to_string()], 100);
        assert_eq!(chunks, vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn test_chunk_flushes_at_limit() {
        // "aaaa\nbbbb" is 9 chars; with limit 8 the second line must start
        // a fresh chunk.
        let chunks = chunk_lines(vec!["aaaa".to_string(), "bbbb".to_string()], 8);
        assert_eq!(chunks, vec!["aaaa".to_string(), "bbbb".to_string()]);

        // Limit 9 fits both lines plus the newline.
        let chunks = chunk_lines(vec!["aaaa".to_string(), "bbbb".to_string()], 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb".to_string()]);
    }

    #[test]
    fn test_chunk_every_chunk_within_limit() {
        let lines: Vec<String> = (0..200).map(|i| format!("line number {}", i)).collect();
        let chunks = chunk_lines(lines, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 100, "chunk over limit: {}", chunk.len());
        }
    }

    #[test]
    fn test_chunk_oversized_line_kept_whole() {
        let long = "x".repeat(50);
        let chunks = chunk_lines(vec![long.clone(), "short".to_string()], 10);
        assert_eq!(chunks, vec![long, "short".to_string()]);
    }

    #[test]
    fn test_error_display() {
        let err = MessengerError::Send("http 502".to_string());
        assert!(err.to_string().contains("502"));
    }
}
