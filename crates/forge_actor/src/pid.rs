use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// An opaque actor identity, unique within the supervisor that assigned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(u64);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid-{}", self.0)
    }
}

/// Issues monotonically increasing, process-unique [`Pid`]s.
#[derive(Debug, Default)]
pub(crate) struct PidAllocator {
    next: AtomicU64,
}

impl PidAllocator {
    pub(crate) fn next(&self) -> Pid {
        Pid(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
impl Pid {
    pub(crate) fn from_raw_for_test(v: u64) -> Pid {
        Pid(v)
    }
}
