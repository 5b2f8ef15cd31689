//! Time-ordered identity generation.
//!
//! Layout, most significant first: 41 bits of milliseconds since
//! [`EPOCH_MILLIS`], 10 bits of worker id, 12 bits of per-millisecond sequence.

use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;

/// 2015-01-01T00:00:00Z
pub const EPOCH_MILLIS: i64 = 1_420_070_400_000;

const WORKER_ID_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

pub const MAX_WORKER_ID: u16 = (1 << WORKER_ID_BITS) - 1;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

#[derive(Debug, Error)]
pub enum IdGeneratorError {
    #[error("worker id {0} is out of range (max {MAX_WORKER_ID})")]
    InvalidWorkerId(u16),

    #[error("id generator state lock poisoned")]
    Poisoned,
}

/// Slack for identities issued by workers whose clocks run ahead of ours.
const CLOCK_SKEW_MILLIS: i64 = 60_000;

/// Wall clock read by the generator.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_millis: i64,
    sequence: u16,
}

/// Generates unique, strictly increasing identities within a process.
///
/// The generator keeps a logical clock that never moves backwards. When the
/// wall clock stalls or steps back and the sequence of the current
/// millisecond is used up, the logical clock moves one millisecond ahead
/// instead of waiting for the wall clock to catch up.
pub struct IdGenerator {
    worker_id: u16,
    clock: Box<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    pub fn new(worker_id: u16) -> Result<Self, IdGeneratorError> {
        Self::with_clock(worker_id, SystemClock)
    }

    pub fn with_clock(
        worker_id: u16,
        clock: impl Clock + 'static,
    ) -> Result<Self, IdGeneratorError> {
        if worker_id > MAX_WORKER_ID {
            return Err(IdGeneratorError::InvalidWorkerId(worker_id));
        }
        Ok(Self {
            worker_id,
            clock: Box::new(clock),
            state: Mutex::new(GeneratorState::default()),
        })
    }

    /// Uses a random worker id, for single-instance deployments that don't
    /// configure one.
    pub fn with_random_worker_id() -> Self {
        Self {
            worker_id: rand::random_range(0..=MAX_WORKER_ID),
            clock: Box::new(SystemClock),
            state: Mutex::new(GeneratorState::default()),
        }
    }

    pub fn worker_id(&self) -> u16 {
        self.worker_id
    }

    pub fn next_id(&self) -> Result<i64, IdGeneratorError> {
        let mut state = self.state.lock().map_err(|_| IdGeneratorError::Poisoned)?;

        let now = self.current_millis();
        if now > state.last_millis {
            state.last_millis = now;
            state.sequence = 0;
        } else if state.sequence < MAX_SEQUENCE {
            state.sequence += 1;
        } else {
            state.last_millis += 1;
            state.sequence = 0;
        }

        Ok(compose(state.last_millis, self.worker_id, state.sequence))
    }

    /// Highest identity any worker can have issued so far, allowing for
    /// clocks running ahead of this one.
    pub fn max_issued_id(&self) -> Result<i64, IdGeneratorError> {
        let state = self.state.lock().map_err(|_| IdGeneratorError::Poisoned)?;
        let millis = self.current_millis().max(state.last_millis) + CLOCK_SKEW_MILLIS;
        Ok(compose(millis, MAX_WORKER_ID, MAX_SEQUENCE))
    }

    fn current_millis(&self) -> i64 {
        self.clock.now_millis() - EPOCH_MILLIS
    }
}

fn compose(millis: i64, worker_id: u16, sequence: u16) -> i64 {
    (millis << (WORKER_ID_BITS + SEQUENCE_BITS))
        | ((worker_id as i64) << SEQUENCE_BITS)
        | sequence as i64
}

/// Milliseconds since the Unix epoch encoded in an identity.
pub fn timestamp_millis(id: i64) -> i64 {
    (id >> (WORKER_ID_BITS + SEQUENCE_BITS)) + EPOCH_MILLIS
}
