//! Identifier generation for enrollment attempts.
//!
//! Formats follow the payment enabler's integration conventions:
//! `ORDER_<millis>_<0..=999>`, `SESSION_<millis>_<9 base-36 chars>`,
//! `TOKEN_<millis>_<9 base-36 chars>` and `TBK_<millis>`.
//!
//! Randomness only has to make collisions unlikely; it is not a security
//! boundary. Buy orders have just 1000 suffixes per millisecond, so the
//! generator tracks the suffixes already issued for the current millisecond
//! and moves to the next millisecond once all of them are taken.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::clock::Clock;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ORDER_SUFFIX_SPACE: u16 = 1000;
const RANDOM_TAIL_LEN: usize = 9;

/// `len` random lowercase base-36 characters.
pub fn random_base36<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

struct IdState {
    rng: StdRng,
    order_millis: i64,
    used_suffixes: HashSet<u16>,
}

pub struct IdGenerator {
    clock: Arc<dyn Clock>,
    state: Mutex<IdState>,
}

impl IdGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_rng(clock, StdRng::from_os_rng())
    }

    /// Deterministic generator for tests.
    pub fn seeded(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self::with_rng(clock, StdRng::seed_from_u64(seed))
    }

    fn with_rng(clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        Self {
            clock,
            state: Mutex::new(IdState {
                rng,
                order_millis: i64::MIN,
                used_suffixes: HashSet::new(),
            }),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut IdState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn buy_order(&self) -> String {
        let now = self.clock.now_millis();
        self.with_state(|state| {
            // The clock may stand still or step back; keep issuing from the
            // latest millisecond seen so far.
            if now > state.order_millis {
                state.order_millis = now;
                state.used_suffixes.clear();
            }
            if state.used_suffixes.len() >= ORDER_SUFFIX_SPACE as usize {
                state.order_millis += 1;
                state.used_suffixes.clear();
            }
            let suffix = loop {
                let candidate = state.rng.random_range(0..ORDER_SUFFIX_SPACE);
                if state.used_suffixes.insert(candidate) {
                    break candidate;
                }
            };
            format!("ORDER_{}_{}", state.order_millis, suffix)
        })
    }

    pub fn session_id(&self) -> String {
        self.prefixed_random("SESSION")
    }

    pub fn gateway_token(&self) -> String {
        self.prefixed_random("TOKEN")
    }

    pub fn tbk_token(&self) -> String {
        format!("TBK_{}", self.clock.now_millis())
    }

    fn prefixed_random(&self, prefix: &str) -> String {
        let now = self.clock.now_millis();
        let tail = self.with_state(|state| random_base36(&mut state.rng, RANDOM_TAIL_LEN));
        format!("{}_{}_{}", prefix, now, tail)
    }
}
