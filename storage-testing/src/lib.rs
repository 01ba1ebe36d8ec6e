// SPDX-License-Identifier: GPL-3.0-only

//! In-memory fakes of the capability traits
//!
//! Each fake keeps just enough state to behave like the host (volumes appear
//! after creation, mounts show up in the table) and records every mutating
//! call so tests can assert on the exact sequence of side effects. Clones
//! share state, so a test keeps one handle while the service owns another.

pub mod lvm;
pub mod mount;
pub mod resize;
pub mod stats;

pub use lvm::{FakeLvm, LvmCall, LvmOp};
pub use mount::{FakeMounter, MountCall};
pub use resize::{FakeResizer, ResizeCall};
pub use stats::FakeStats;

use std::sync::{Mutex, MutexGuard};

/// Lock a fake's state, recovering from a panic in another test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
