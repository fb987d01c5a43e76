//! Media flow-control state machine.
//!
//! `Idle -> Started -> (Paused <-> Running) -> Completed`, driven by the
//! control tokens of one media connection. Pausing is tracked apart from the
//! phase: an XOFF may land before the first XON, and resuming must return to
//! whatever phase was interrupted.

use ariwire_core::protocol::media::{MediaEvent, MediaStart};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Started,
    Running,
    Paused,
    Completed,
}

/// What the relay should do in response to one control token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    /// `MEDIA_START`: begin an outbound transmission.
    BeginTransmission(MediaStart),
    /// `MEDIA_XOFF`: take and hold the send gate.
    Pause,
    /// `MEDIA_XON`: release the held gate.
    Resume,
    /// Terminal buffering completion: answer `HANGUP` and end.
    Hangup,
    /// Non-terminal completion: a delayed follow-up may be armed.
    ScheduleFollowUp,
    /// Token does not apply in the current state, or is unknown.
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Running,
    Completed,
}

pub struct FlowControl {
    phase: Phase,
    paused: bool,
    terminal_marker: String,
}

impl FlowControl {
    pub fn new(terminal_marker: impl Into<String>) -> Self {
        Self {
            phase: Phase::Idle,
            paused: false,
            terminal_marker: terminal_marker.into(),
        }
    }

    pub fn state(&self) -> FlowState {
        if self.paused {
            return FlowState::Paused;
        }
        match self.phase {
            Phase::Idle => FlowState::Idle,
            Phase::Started => FlowState::Started,
            Phase::Running => FlowState::Running,
            Phase::Completed => FlowState::Completed,
        }
    }

    pub fn apply(&mut self, event: &MediaEvent) -> FlowAction {
        match event {
            MediaEvent::Start(start) => {
                // A restart drops any pause left over from the previous run.
                self.phase = Phase::Started;
                self.paused = false;
                FlowAction::BeginTransmission(start.clone())
            }
            MediaEvent::Xoff => {
                // Echo keeps writing after completion, so only Idle refuses.
                if self.paused || self.phase == Phase::Idle {
                    return FlowAction::Ignore;
                }
                self.paused = true;
                FlowAction::Pause
            }
            MediaEvent::Xon => {
                if self.phase == Phase::Started {
                    self.phase = Phase::Running;
                }
                if !self.paused {
                    return FlowAction::Ignore;
                }
                self.paused = false;
                FlowAction::Resume
            }
            MediaEvent::BufferingCompleted { detail } => {
                if !self.is_active() {
                    return FlowAction::Ignore;
                }
                self.phase = Phase::Completed;
                let terminal = detail
                    .as_deref()
                    .is_some_and(|d| d.contains(self.terminal_marker.as_str()));
                if terminal {
                    FlowAction::Hangup
                } else {
                    FlowAction::ScheduleFollowUp
                }
            }
            MediaEvent::Other(_) => FlowAction::Ignore,
        }
    }

    /// A follow-up transmission was armed after a completion.
    pub fn rearm(&mut self) {
        if self.phase == Phase::Completed {
            self.phase = Phase::Started;
        }
    }

    fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Started | Phase::Running)
    }
}
