use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Victim-selection policy over a fixed universe of frame slots.
pub trait Replacer: Send + Sync {
    /// Picks an unpinned frame for reuse, or `None` if every frame is pinned.
    fn victim(&self) -> Option<usize>;

    fn pin(&self, frame_id: usize);

    fn unpin(&self, frame_id: usize);

    /// Number of frames currently eligible for victimization.
    fn size(&self) -> usize;
}

// Per-slot state: pinned (not in the clock), unpinned, unpinned with the
// reference bit set.
const PINNED: i8 = -1;
const REF_ZERO: i8 = 0;
const REF_ONE: i8 = 1;

/// Clock (second chance) replacer. Every slot starts pinned; frames only
/// enter the clock through `unpin`.
pub struct ClockReplacer {
    size: AtomicUsize,
    hand: AtomicUsize,
    frame_holder: Mutex<Vec<i8>>,
}

impl ClockReplacer {
    pub fn new(size: usize) -> ClockReplacer {
        ClockReplacer {
            size: AtomicUsize::new(0),
            hand: AtomicUsize::new(0),
            frame_holder: Mutex::new(vec![PINNED; size]),
        }
    }
}

impl Replacer for ClockReplacer {
    fn victim(&self) -> Option<usize> {
        let mut guard = self.frame_holder.lock().unwrap();
        if self.size.load(Ordering::Acquire) == 0 {
            return None;
        }

        // At least one slot is REF_ZERO or REF_ONE, and a full revolution
        // downgrades every REF_ONE, so this terminates within two laps.
        let mut hand = self.hand.load(Ordering::Relaxed);
        loop {
            match guard[hand] {
                REF_ZERO => {
                    guard[hand] = PINNED;
                    self.size.fetch_sub(1, Ordering::AcqRel);
                    self.hand.store((hand + 1) % guard.len(), Ordering::Release);
                    return Some(hand);
                }
                REF_ONE => guard[hand] = REF_ZERO,
                _ => {}
            }
            hand = (hand + 1) % guard.len();
        }
    }

    fn pin(&self, frame_id: usize) {
        let mut guard = self.frame_holder.lock().unwrap();
        if frame_id >= guard.len() {
            return;
        }
        if guard[frame_id] != PINNED {
            guard[frame_id] = PINNED;
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn unpin(&self, frame_id: usize) {
        let mut guard = self.frame_holder.lock().unwrap();
        if frame_id >= guard.len() {
            return;
        }
        if guard[frame_id] == PINNED {
            self.size.fetch_add(1, Ordering::AcqRel);
        }
        guard[frame_id] = REF_ONE;
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }
}
