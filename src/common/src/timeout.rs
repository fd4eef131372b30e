//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
//! Relative timeouts and absolute deadlines for blocking calls.
use std::time::{Duration, Instant};

/// A relative timeout accepted by blocking operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeout {
    /// Poll the condition once and return immediately.
    Immediate,
    /// Wait for at most the specified duration.
    After(Duration),
    /// Wait forever.
    Infinite,
}

impl Timeout {
    /// Convert this timeout to an absolute deadline measured from now.
    pub fn to_deadline(self) -> Deadline {
        match self {
            Timeout::Immediate => Deadline::Immediate,
            Timeout::After(d) => match Instant::now().checked_add(d) {
                Some(at) => Deadline::At(at),
                None => Deadline::Infinite,
            },
            Timeout::Infinite => Deadline::Infinite,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(x: Duration) -> Self {
        if x == Duration::from_secs(0) {
            Timeout::Immediate
        } else {
            Timeout::After(x)
        }
    }
}

/// An absolute point in time after which a blocking call gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deadline {
    Immediate,
    At(Instant),
    Infinite,
}

impl Deadline {
    pub fn has_elapsed(&self) -> bool {
        match *self {
            Deadline::Immediate => true,
            Deadline::At(at) => Instant::now() >= at,
            Deadline::Infinite => false,
        }
    }

    /// The earlier of `self` and `now + slice`. Used by loops that block in
    /// short slices so they can make progress on other work in between.
    pub fn clamp(&self, slice: Duration) -> Instant {
        let limit = Instant::now() + slice;
        match *self {
            Deadline::Immediate => Instant::now(),
            Deadline::At(at) if at < limit => at,
            _ => limit,
        }
    }

    /// Return the instant to pass to `Condvar::wait_until`, or `None` for an
    /// infinite wait.
    pub fn instant(&self) -> Option<Instant> {
        match *self {
            Deadline::Immediate => Some(Instant::now()),
            Deadline::At(at) => Some(at),
            Deadline::Infinite => None,
        }
    }
}
