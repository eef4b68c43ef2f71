use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::handoff::{Handoff, LaunchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Sms,
    WhatsApp,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Sms => f.write_str("SMS"),
            Platform::WhatsApp => f.write_str("WhatsApp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub phone_number: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self { name: name.into(), phone_number: phone_number.into() }
    }
}

/// One recipient and the message already rendered for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchItem {
    pub recipient: Recipient,
    pub rendered_message: String,
}

impl DispatchItem {
    pub fn new(recipient: Recipient, rendered_message: impl Into<String>) -> Self {
        Self { recipient, rendered_message: rendered_message.into() }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("There is nobody to send the message to.")]
    EmptySequence,
    #[error("A broadcast is already in progress.")]
    AlreadyActive,
    #[error("No broadcast is in progress.")]
    NotActive,
    #[error("Every recipient has already been handled.")]
    AlreadyCompleted,
    #[error("The broadcast has not finished yet.")]
    NotCompleted,
    #[error("Waiting for you to come back from the messaging app.")]
    AwaitingReturn,
    #[error("This broadcast goes out over {expected}, not {got}.")]
    PlatformMismatch { expected: Platform, got: Platform },
    #[error("Could not open {platform} for {recipient}. The broadcast was stopped.")]
    HandoffFailed {
        recipient: String,
        platform: Platform,
        #[source]
        source: LaunchError,
    },
}

/// Result of a successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// More recipients remain; `index` is the next one.
    Next { index: usize },
    Completed,
}

/// Drives one recipient at a time through a messaging hand-off.
///
/// `idle -> active(0) -> ... -> active(n, completed) -> idle`, with `cancel`
/// returning to idle from anywhere. Only one sequence exists per session and
/// it is never persisted.
#[derive(Debug, Clone, Default)]
pub struct DispatchSequence {
    items: Vec<DispatchItem>,
    current_index: usize,
    platform: Platform,
    is_active: bool,
    is_completed: bool,
}

impl DispatchSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, items: Vec<DispatchItem>, platform: Platform) -> Result<(), DispatchError> {
        if items.is_empty() {
            return Err(DispatchError::EmptySequence);
        }
        if self.is_active {
            return Err(DispatchError::AlreadyActive);
        }
        info!("starting {platform} broadcast to {} recipients", items.len());
        self.items = items;
        self.current_index = 0;
        self.platform = platform;
        self.is_active = true;
        self.is_completed = false;
        Ok(())
    }

    /// Hand the current item to `handoff` and move on.
    ///
    /// A failed hand-off cancels the whole sequence. A hand-off for another
    /// platform is refused and leaves the state untouched.
    pub fn advance(&mut self, handoff: &dyn Handoff) -> Result<Advance, DispatchError> {
        self.ensure_pending()?;
        if handoff.platform() != self.platform {
            return Err(DispatchError::PlatformMismatch { expected: self.platform, got: handoff.platform() });
        }
        let item = &self.items[self.current_index];
        if let Err(source) = handoff.open(item) {
            let recipient = item.recipient.name.clone();
            warn!("hand-off {} of {} failed: {source}", self.current_index + 1, self.items.len());
            let platform = self.platform;
            self.cancel();
            return Err(DispatchError::HandoffFailed { recipient, platform, source });
        }
        Ok(self.step())
    }

    /// Move past the current recipient without opening anything.
    pub fn skip(&mut self) -> Result<Advance, DispatchError> {
        self.ensure_pending()?;
        info!("skipping recipient {}", self.items[self.current_index].recipient.name);
        Ok(self.step())
    }

    /// Close a completed sequence.
    pub fn acknowledge(&mut self) -> Result<(), DispatchError> {
        if !self.is_completed {
            return Err(if self.is_active { DispatchError::NotCompleted } else { DispatchError::NotActive });
        }
        self.cancel();
        Ok(())
    }

    pub fn cancel(&mut self) {
        if self.is_active && !self.is_completed {
            info!("broadcast cancelled at {}/{}", self.current_index, self.items.len());
        }
        *self = Self::default();
    }

    pub fn items(&self) -> &[DispatchItem] {
        &self.items
    }

    pub fn current(&self) -> Option<&DispatchItem> {
        if self.is_active { self.items.get(self.current_index) } else { None }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// `(handled, total)`.
    pub fn progress(&self) -> (usize, usize) {
        (self.current_index, self.items.len())
    }

    fn ensure_pending(&self) -> Result<(), DispatchError> {
        if !self.is_active {
            return Err(DispatchError::NotActive);
        }
        if self.is_completed {
            return Err(DispatchError::AlreadyCompleted);
        }
        Ok(())
    }

    fn step(&mut self) -> Advance {
        self.current_index += 1;
        if self.current_index == self.items.len() {
            self.is_completed = true;
            info!("broadcast finished: {} recipients", self.items.len());
            Advance::Completed
        } else {
            Advance::Next { index: self.current_index }
        }
    }
}
