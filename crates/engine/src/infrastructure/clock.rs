//! Clock and random implementations.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::infrastructure::ports::{Clock, Random};
use crewmute_domain::ConnectCode;

/// System clock - uses real time.
#[derive(Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// System random - uses real randomness.
#[derive(Default)]
pub struct SystemRandom;

impl SystemRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Random for SystemRandom {
    fn connect_code(&self) -> ConnectCode {
        let mut rng = rand::thread_rng();
        let code: String = (0..ConnectCode::LEN)
            .map(|_| {
                let idx = rng.gen_range(0..ConnectCode::ALPHABET.len());
                ConnectCode::ALPHABET[idx] as char
            })
            .collect();
        ConnectCode::new(code)
    }
}

/// Fixed clock for testing; advance it by hand.
#[cfg(test)]
pub struct FixedClock(std::sync::Mutex<DateTime<Utc>>);

#[cfg(test)]
impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(std::sync::Mutex::new(at))
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.0.lock().expect("clock poisoned");
        *guard = *guard + by;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().expect("clock poisoned")
    }
}

/// Fixed random for testing.
#[cfg(test)]
pub struct FixedRandom(pub ConnectCode);

#[cfg(test)]
impl Random for FixedRandom {
    fn connect_code(&self) -> ConnectCode {
        self.0.clone()
    }
}
