// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The reconciliation engine: admission, the periodic scan loop, and the
//! per-volume ack-timer registry that gives each timer its own task.

pub mod ack_timers;
pub mod error;
pub mod reconciler;

pub use ack_timers::AckTimers;
pub use error::{AdmissionError, ReconcileError};
pub use reconciler::{Reconciler, ReconcilerConfig, FS_GROUP_SENTINEL};
