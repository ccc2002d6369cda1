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

//! Fixed-size worker pool with two entry points: a blocking batch map and a
//! shared task queue whose tasks may enqueue follow-up tasks.

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
};

use rayon::prelude::*;
use tracing::debug;

use crate::error::MeshGenResult;

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

struct QueueState<T> {
    tasks: VecDeque<T>,
    in_flight: usize,
    stopped: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WorkerPool {
    pub fn new(threads: usize) -> MeshGenResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("meshgen-{i}"))
            .build()?;
        debug!(threads = pool.current_num_threads(), "worker pool started");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` over every item and block until all are done. Results keep
    /// the order of `items`.
    pub fn run_batch<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        self.pool.install(|| items.into_par_iter().map(f).collect())
    }

    /// Drain a shared queue seeded with `seed`. Each task may push follow-up
    /// tasks into the vector it is handed. Blocks until the queue is empty
    /// and no task is running. Once `interrupted` reports true, queued tasks
    /// are dropped and running ones finish their current unit.
    pub fn drain_queue<T, F, I>(&self, seed: Vec<T>, interrupted: I, f: F)
    where
        T: Send,
        F: Fn(T, &mut Vec<T>) + Sync,
        I: Fn() -> bool + Sync,
    {
        let state = Mutex::new(QueueState {
            tasks: seed.into_iter().collect::<VecDeque<T>>(),
            in_flight: 0,
            stopped: false,
        });
        let ready = Condvar::new();
        let workers = self.threads();

        self.pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| worker_loop(&state, &ready, &interrupted, &f));
            }
        });
    }
}

fn worker_loop<T, F, I>(state: &Mutex<QueueState<T>>, ready: &Condvar, interrupted: &I, f: &F)
where
    F: Fn(T, &mut Vec<T>),
    I: Fn() -> bool,
{
    let mut children = Vec::new();
    loop {
        let task = {
            let mut st = lock(state);
            loop {
                if st.stopped {
                    return;
                }
                if let Some(task) = st.tasks.pop_front() {
                    st.in_flight += 1;
                    break task;
                }
                if st.in_flight == 0 {
                    st.stopped = true;
                    ready.notify_all();
                    return;
                }
                st = ready.wait(st).unwrap_or_else(PoisonError::into_inner);
            }
        };

        let cancelled = interrupted();
        if !cancelled {
            f(task, &mut children);
        }

        let mut st = lock(state);
        st.in_flight -= 1;
        if cancelled {
            st.tasks.clear();
            children.clear();
        } else {
            st.tasks.extend(children.drain(..));
        }
        ready.notify_all();
    }
}

/// Batch map on `pool`, or on the calling thread when there is none.
pub fn run_batch<T, R, F>(pool: Option<&WorkerPool>, items: Vec<T>, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    match pool {
        Some(p) => p.run_batch(items, f),
        None => items.into_iter().map(f).collect(),
    }
}

/// Queue drain on `pool`, or depth-first on the calling thread.
pub fn drain_queue<T, F, I>(pool: Option<&WorkerPool>, seed: Vec<T>, interrupted: I, f: F)
where
    T: Send,
    F: Fn(T, &mut Vec<T>) + Sync,
    I: Fn() -> bool + Sync,
{
    if let Some(p) = pool {
        p.drain_queue(seed, interrupted, f);
        return;
    }
    let mut stack = seed;
    stack.reverse();
    let mut children = Vec::new();
    while let Some(task) = stack.pop() {
        if interrupted() {
            return;
        }
        f(task, &mut children);
        stack.extend(children.drain(..).rev());
    }
}
