//! Outbound chat messages
//!
//! The quiz never talks to a chat network directly. Whatever connects to the
//! network implements [`Transport`] and hands inbound messages to
//! [`crate::registry::Registry::on_message`].

use async_trait::async_trait;

use crate::{error::TransportError, ids::ChannelId};

/// Trait for delivering text to a chat channel
///
/// Implementations might speak IRC, a chat platform API, or simply record
/// messages in tests. They are shared by every session and must tolerate
/// concurrent calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a single line of text to a channel
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the message could not be delivered.
    async fn send_text(&self, channel: &ChannelId, text: &str) -> Result<(), TransportError>;

    /// Sends multi-line text as one message per line, skipping blank lines
    ///
    /// Stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the [`TransportError`] of the line that failed.
    async fn send_lines(&self, channel: &ChannelId, text: &str) -> Result<(), TransportError> {
        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            self.send_text(channel, line).await?;
        }
        Ok(())
    }
}
