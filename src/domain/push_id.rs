// Chronologically ordered record keys in the realtime database's push-id format
use rand::Rng;
use std::sync::{Mutex, PoisonError};

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const RANDOM_LEN: usize = 12;

/// Generates 20-character keys: 8 characters of timestamp followed by 12
/// random characters. Keys sort lexicographically in creation order, also
/// when several are generated within the same millisecond.
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<PushState>,
}

#[derive(Debug, Default)]
struct PushState {
    last_time: i64,
    last_random: [u8; RANDOM_LEN],
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now_ms: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let duplicate_time = now_ms == state.last_time;
        state.last_time = now_ms;

        let mut time = now_ms.max(0) as u64;
        let mut time_chars = [0u8; 8];
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(time % 64) as usize];
            time /= 64;
        }

        if duplicate_time {
            increment(&mut state.last_random);
        } else {
            let mut rng = rand::rng();
            for digit in state.last_random.iter_mut() {
                *digit = rng.random_range(0..64);
            }
        }

        let mut id = String::with_capacity(8 + RANDOM_LEN);
        id.extend(time_chars.iter().map(|&c| c as char));
        id.extend(state.last_random.iter().map(|&d| PUSH_CHARS[d as usize] as char));
        id
    }
}

fn increment(digits: &mut [u8; RANDOM_LEN]) {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}
