// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Mount session state machine with typed state transitions.
//!
//! A session is either Unmounted or Mounted. While Mounted it owns the
//! backend's instrumentation handle (a wrapper process or a counter baseline).
//! Invalid transitions result in StateTransitionError.

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;

/// Mount lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MountState {
    /// Backing store is idle; formatting is allowed.
    Unmounted,

    /// Filesystem is mounted and writes are being counted.
    Mounted,
}

impl MountState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unmounted => "Unmounted",
            Self::Mounted => "Mounted",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: MountState) -> bool {
        matches!(
            (self, target),
            (Self::Unmounted, Self::Mounted) | (Self::Mounted, Self::Unmounted)
        )
    }
}

impl std::fmt::Display for MountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Two-state machine holding the instrumentation handle `H` while mounted.
#[derive(Debug)]
pub struct MountSession<H> {
    backend: String,
    handle: Option<H>,
}

impl<H> MountSession<H> {
    /// Create an unmounted session for a backend.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            handle: None,
        }
    }

    /// Get the current state.
    pub fn state(&self) -> MountState {
        if self.handle.is_some() {
            MountState::Mounted
        } else {
            MountState::Unmounted
        }
    }

    /// Fail unless the session is unmounted (e.g. before `format`).
    pub fn require_unmounted(&self, operation: &'static str) -> Result<(), StateTransitionError> {
        let state = self.state();
        if state != MountState::Unmounted {
            return Err(StateTransitionError::NotPermitted {
                backend: self.backend.clone(),
                operation,
                state: state.name(),
            });
        }
        Ok(())
    }

    /// Check that a transition to `target` is valid, without changing state.
    pub fn check_transition(&self, target: MountState) -> Result<(), StateTransitionError> {
        let current = self.state();
        if !current.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                backend: self.backend.clone(),
                from: current.name(),
                to: target.name(),
            });
        }
        Ok(())
    }

    /// Unmounted → Mounted, taking ownership of the instrumentation handle.
    pub fn mounted(&mut self, handle: H) -> Result<(), StateTransitionError> {
        self.check_transition(MountState::Mounted)?;

        tracing::debug!(
            backend = %self.backend,
            from = MountState::Unmounted.name(),
            to = MountState::Mounted.name(),
            "State transition"
        );

        self.handle = Some(handle);
        Ok(())
    }

    /// Mounted → Unmounted, returning the instrumentation handle.
    pub fn unmounted(&mut self) -> Result<H, StateTransitionError> {
        self.check_transition(MountState::Unmounted)?;

        tracing::debug!(
            backend = %self.backend,
            from = MountState::Mounted.name(),
            to = MountState::Unmounted.name(),
            "State transition"
        );

        self.handle
            .take()
            .ok_or_else(|| StateTransitionError::InvalidTransition {
                backend: self.backend.clone(),
                from: MountState::Unmounted.name(),
                to: MountState::Unmounted.name(),
            })
    }

    /// Take the handle without validation, for teardown in `Drop`.
    pub fn take(&mut self) -> Option<H> {
        self.handle.take()
    }
}
