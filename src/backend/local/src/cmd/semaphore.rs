//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Implementation of `Semaphore`.
use log::trace;
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

use taskhal_base::{self as base, SemaphoreList, SemaphoreRef};
use taskhal_common::{Error, ErrorKind, Result, Timeout};
use taskhal_task::{SignalTarget, WaitSource};

/// Implementation of `Semaphore` using a mutex and a condition variable.
#[derive(Debug)]
pub struct LocalSemaphore {
    state: Mutex<SemaphoreState>,
    cvar: Condvar,
}

#[derive(Debug)]
struct SemaphoreState {
    value: u64,
    failure: Option<Error>,
}

impl SemaphoreState {
    fn check(&self) -> Result<u64> {
        match self.failure {
            Some(ref e) => Err(e.clone()),
            None => Ok(self.value),
        }
    }
}

impl LocalSemaphore {
    pub fn new(initial_value: u64) -> Self {
        Self {
            state: Mutex::new(SemaphoreState {
                value: initial_value,
                failure: None,
            }),
            cvar: Condvar::new(),
        }
    }
}

impl base::Semaphore for LocalSemaphore {
    fn query(&self) -> Result<u64> {
        self.state.lock().check()
    }

    fn signal(&self, value: u64) -> Result<()> {
        let mut state = self.state.lock();
        let current = state.check()?;
        if value < current {
            return Err(Error::with_detail(
                ErrorKind::FailedPrecondition,
                format!(
                    "cannot signal value {} lower than the current value {}",
                    value, current
                ),
            ));
        }
        state.value = value;
        self.cvar.notify_all();
        Ok(())
    }

    fn fail(&self, error: Error) {
        let mut state = self.state.lock();
        if state.failure.is_none() {
            state.failure = Some(error);
        }
        self.cvar.notify_all();
    }

    fn wait(&self, value: u64, timeout: Timeout) -> Result<()> {
        let deadline = timeout.to_deadline();
        let mut state = self.state.lock();
        loop {
            if state.check()? >= value {
                return Ok(());
            }
            match deadline.instant() {
                _ if deadline.has_elapsed() => {
                    return Err(ErrorKind::DeadlineExceeded.into());
                }
                Some(at) => {
                    self.cvar.wait_until(&mut state, at);
                }
                None => {
                    self.cvar.wait(&mut state);
                }
            }
        }
    }
}

/// Polls a list of semaphores until each reaches its payload value.
#[derive(Debug)]
pub(crate) struct SemaphoreWait {
    pending: SmallVec<[(SemaphoreRef, u64); 4]>,
}

impl SemaphoreWait {
    pub(crate) fn new(list: &SemaphoreList<'_>) -> Self {
        Self {
            pending: list.iter().map(|(s, v)| (s.clone(), v)).collect(),
        }
    }
}

impl WaitSource for SemaphoreWait {
    fn poll(&mut self) -> Result<bool> {
        let mut i = 0;
        while i < self.pending.len() {
            let (ref semaphore, value) = self.pending[i];
            if semaphore.query()? >= value {
                self.pending.swap_remove(i);
            } else {
                i += 1;
            }
        }
        Ok(self.pending.is_empty())
    }
}

/// Signals a list of semaphores when a batch retires, or fails them if the
/// batch failed.
#[derive(Debug)]
pub(crate) struct SemaphoreSignal {
    batch: u64,
    signals: SmallVec<[(SemaphoreRef, u64); 4]>,
}

impl SemaphoreSignal {
    pub(crate) fn new(batch: u64, list: &SemaphoreList<'_>) -> Self {
        Self {
            batch,
            signals: list.iter().map(|(s, v)| (s.clone(), v)).collect(),
        }
    }
}

impl SignalTarget for SemaphoreSignal {
    fn signal(self: Box<Self>) -> Result<()> {
        trace!("batch #{} retired", self.batch);
        for (semaphore, value) in self.signals.iter() {
            semaphore.signal(*value)?;
        }
        Ok(())
    }

    fn fail(self: Box<Self>, error: &Error) {
        trace!("batch #{} failed: {}", self.batch, error);
        for (semaphore, _) in self.signals.iter() {
            semaphore.fail(error.clone());
        }
    }
}
