//! Incremental DOM patcher
//!
//! Decides what happens to each parsed node, in arrival order:
//!
//! - an instruction is deferred, never grafted
//! - any other node is grafted in front of the patcher's anchor, and then
//!   every deferred instruction runs, oldest first
//! - a chunk separator only releases the deferred instructions; it is not
//!   grafted, so separators never pile up in the target
//! - at the end of the stream, instructions still deferred run, and the
//!   anchor is detached
//!
//! The patcher only produces [`PatchAction`]s; applying them is up to the
//! caller, so the whole protocol runs without a document.

use std::collections::VecDeque;
use tracing::trace;

/// Where the patcher is in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatcherState {
    /// Waiting for the next node
    Parsing,
    /// Actions are queued and not yet taken
    Grafting,
    /// At least one instruction is waiting for a following node
    AwaitingInstructionTarget,
    /// Detached; further input is ignored
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchAction<N> {
    /// Move the node into the document, before the anchor
    Graft(N),
    /// Run the instruction
    Execute(N),
    /// Remove the anchor
    Detach,
}

/// Ordering state machine for one streamed response
#[derive(Debug)]
pub struct Patcher<N> {
    state: PatcherState,
    deferred: VecDeque<N>,
    actions: VecDeque<PatchAction<N>>,
    ended: bool,
}

impl<N> Default for Patcher<N> {
    fn default() -> Self {
        Self {
            state: PatcherState::Parsing,
            deferred: VecDeque::new(),
            actions: VecDeque::new(),
            ended: false,
        }
    }
}

impl<N> Patcher<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PatcherState {
        self.state
    }

    /// Instructions waiting for a following node
    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Accept the next node. Returns `false` once the stream has ended.
    pub fn push(&mut self, node: N, is_instruction: bool) -> bool {
        if self.ended {
            return false;
        }

        if is_instruction {
            self.deferred.push_back(node);
            trace!(deferred = self.deferred.len(), "Deferred instruction");
        } else {
            self.actions.push_back(PatchAction::Graft(node));
            self.actions
                .extend(self.deferred.drain(..).map(PatchAction::Execute));
        }
        self.settle();
        true
    }

    /// A following node that is not grafted: run what is deferred.
    /// Returns `false` once the stream has ended.
    pub fn release(&mut self) -> bool {
        if self.ended {
            return false;
        }
        self.actions
            .extend(self.deferred.drain(..).map(PatchAction::Execute));
        self.settle();
        true
    }

    /// End of stream: run what is still deferred, then detach.
    pub fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.actions
            .extend(self.deferred.drain(..).map(PatchAction::Execute));
        self.actions.push_back(PatchAction::Detach);
        self.settle();
    }

    /// Take the next action to apply
    pub fn next_action(&mut self) -> Option<PatchAction<N>> {
        let action = self.actions.pop_front();
        if let Some(PatchAction::Detach) = action {
            self.state = PatcherState::Finished;
        } else {
            self.settle();
        }
        action
    }

    fn settle(&mut self) {
        if self.state == PatcherState::Finished {
            return;
        }
        self.state = if !self.actions.is_empty() {
            PatcherState::Grafting
        } else if !self.deferred.is_empty() {
            PatcherState::AwaitingInstructionTarget
        } else {
            PatcherState::Parsing
        };
    }
}
