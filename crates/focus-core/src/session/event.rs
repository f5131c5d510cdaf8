//! Live session updates.

use super::model::Session;
use crate::error::Result;
use crate::store::{DocumentEvent, DocumentSubscription};

/// Change observed on a subscribed session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Current state after any write.
    Updated(Session),
    /// The session no longer exists (cancelled by its host). Not an error.
    Removed,
}

/// Typed view over a session document subscription.
#[derive(Debug)]
pub struct SessionSubscription {
    session_id: String,
    inner: DocumentSubscription,
}

impl SessionSubscription {
    pub(crate) fn new(session_id: impl Into<String>, inner: DocumentSubscription) -> Self {
        Self {
            session_id: session_id.into(),
            inner,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Waits for the next change.
    ///
    /// Returns `None` when the store closes the subscription, and `Some(Err)`
    /// if a snapshot cannot be decoded.
    pub async fn next(&mut self) -> Option<Result<SessionEvent>> {
        let event = self.inner.next().await?;
        Some(Self::convert(event))
    }

    /// Returns a pending change without waiting.
    pub fn try_next(&mut self) -> Option<Result<SessionEvent>> {
        self.inner.try_next().map(Self::convert)
    }

    fn convert(event: DocumentEvent) -> Result<SessionEvent> {
        match event {
            DocumentEvent::Snapshot(document) => {
                Session::from_document(&document).map(SessionEvent::Updated)
            }
            DocumentEvent::Removed => Ok(SessionEvent::Removed),
        }
    }
}
