//! The "I'm OK" broadcast as the UI drives it.
//!
//! A [`BroadcastSession`] pairs the dispatch sequence with a return watcher:
//! after each hand-off the "next" action stays disabled until the user comes
//! back from the messaging app or the fallback timer runs out.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use log::info;

use crate::api::models::FamilyMember;
use crate::dispatch::{
    Advance, ArmToken, DispatchError, DispatchItem, DispatchSequence, Handoff, HostEvent, Platform, Recipient,
    ReturnWatcher,
};
use crate::message::{MessageContext, render};

/// Render one item per family member, in list order.
pub fn prepare_items(members: &[FamilyMember], template: &str, ctx: &MessageContext<'_>) -> Vec<DispatchItem> {
    members
        .iter()
        .map(|m| DispatchItem::new(Recipient::from(m), render(template, &m.name, ctx)))
        .collect()
}

/// What the user chose when asked to confirm the next hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave this recipient out and continue with the next one.
    Skip,
    /// Stop the broadcast.
    CancelRemaining,
}

/// Outcome of a successful hand-off step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub advance: Advance,
    /// Set when the watcher was armed; the host schedules the fallback
    /// timer with it.
    pub token: Option<ArmToken>,
}

pub struct BroadcastSession {
    sequence: DispatchSequence,
    watcher: ReturnWatcher,
    waiting: Rc<Cell<bool>>,
}

impl BroadcastSession {
    pub fn new(return_timeout: Duration) -> Self {
        Self {
            sequence: DispatchSequence::new(),
            watcher: ReturnWatcher::new(return_timeout),
            waiting: Rc::new(Cell::new(false)),
        }
    }

    pub fn begin(&mut self, items: Vec<DispatchItem>, platform: Platform) -> Result<(), DispatchError> {
        self.sequence.start(items, platform)?;
        self.stop_waiting();
        Ok(())
    }

    pub fn sequence(&self) -> &DispatchSequence {
        &self.sequence
    }

    pub fn return_timeout(&self) -> Duration {
        self.watcher.timeout()
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.get()
    }

    /// Whether the UI should enable its "next" action.
    pub fn can_advance(&self) -> bool {
        self.sequence.is_active() && !self.sequence.is_completed() && !self.is_waiting()
    }

    pub fn advance(&mut self, handoff: &dyn Handoff) -> Result<Step, DispatchError> {
        self.ensure_not_waiting()?;
        match self.sequence.advance(handoff) {
            Ok(Advance::Next { index }) => {
                let waiting = self.waiting.clone();
                waiting.set(true);
                let token = self.watcher.arm(move |signal| {
                    info!("ready for the next recipient ({signal:?})");
                    waiting.set(false);
                });
                Ok(Step { advance: Advance::Next { index }, token: Some(token) })
            }
            Ok(Advance::Completed) => {
                self.stop_waiting();
                Ok(Step { advance: Advance::Completed, token: None })
            }
            Err(e) => {
                if !self.sequence.is_active() {
                    self.stop_waiting();
                }
                Err(e)
            }
        }
    }

    /// Apply the user's answer to a declined confirmation.
    pub fn decline(&mut self, decision: Decision) -> Result<Option<Advance>, DispatchError> {
        match decision {
            Decision::Skip => {
                self.ensure_not_waiting()?;
                self.sequence.skip().map(Some)
            }
            Decision::CancelRemaining => {
                self.cancel();
                Ok(None)
            }
        }
    }

    pub fn handle_event(&mut self, event: HostEvent) -> bool {
        self.watcher.handle_event(event)
    }

    /// Fallback timer expiry; counts as the user being back.
    pub fn handle_timeout(&mut self, token: ArmToken) -> bool {
        self.watcher.handle_timeout(token)
    }

    pub fn acknowledge(&mut self) -> Result<(), DispatchError> {
        self.sequence.acknowledge()?;
        self.stop_waiting();
        Ok(())
    }

    pub fn cancel(&mut self) {
        self.sequence.cancel();
        self.stop_waiting();
    }

    fn ensure_not_waiting(&self) -> Result<(), DispatchError> {
        if self.is_waiting() && self.sequence.is_active() {
            return Err(DispatchError::AwaitingReturn);
        }
        Ok(())
    }

    fn stop_waiting(&mut self) {
        self.watcher.disarm();
        self.waiting.set(false);
    }
}
