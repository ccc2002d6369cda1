// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Alexandre Severino
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Coarse progress reporting plus a cooperative interrupt request.
///
/// Implementations are shared by every worker, so all methods take `&self`.
pub trait Progress: Send + Sync {
    /// Announce the number of steps of the upcoming stage.
    fn nsteps(&self, n: usize);
    /// Advance by `k` steps.
    fn inc(&self, k: usize);
    /// Request cancellation.
    fn interrupt(&self);
    /// Whether cancellation was requested.
    fn interrupted(&self) -> bool;
}

/// Lock-free counter implementation of [`Progress`].
#[derive(Debug, Default)]
pub struct ProgressCounter {
    total: AtomicUsize,
    done: AtomicUsize,
    flag: AtomicBool,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    /// Completed fraction of the current stage, in [0, 1].
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.done() as f64 / total as f64).min(1.0)
    }

    /// Clear a previous interrupt so the counter can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
        self.done.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
    }
}

impl Progress for ProgressCounter {
    fn nsteps(&self, n: usize) {
        self.total.store(n, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    fn inc(&self, k: usize) {
        self.done.fetch_add(k, Ordering::Relaxed);
    }

    fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    fn interrupted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
