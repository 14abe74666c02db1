use std::collections::HashSet;
use std::time::{Duration, Instant};

use super::{Modifier, ShortcutBinding, TriggerKey};

/// Seconds between two accepted triggers of the same chord.
pub const TRIGGER_COOLDOWN: Duration = Duration::from_secs(1);

/// A key the tracker cares about. Keys with no token (arrows, media keys, ...)
/// are ignored by the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyToken {
    Modifier(Modifier),
    Key(TriggerKey),
}

/// Turns a stream of press/release events into chord triggers.
///
/// The chord fires when the held set equals the binding exactly, so holding an
/// extra modifier or letter suppresses it. After firing the held set is
/// cleared: auto-repeat presses of the trigger key then never re-match
/// until the modifiers are pressed again.
pub struct ChordTracker {
    wanted: HashSet<KeyToken>,
    held: HashSet<KeyToken>,
    cooldown: Duration,
    last_trigger: Option<Instant>,
}

impl ChordTracker {
    pub fn new(binding: &ShortcutBinding) -> Self {
        Self::with_cooldown(binding, TRIGGER_COOLDOWN)
    }

    pub fn with_cooldown(binding: &ShortcutBinding, cooldown: Duration) -> Self {
        Self {
            wanted: binding.tokens().into_iter().collect(),
            held: HashSet::new(),
            cooldown,
            last_trigger: None,
        }
    }

    /// Returns true when this press completes the chord.
    pub fn press(&mut self, token: KeyToken, now: Instant) -> bool {
        self.held.insert(token);

        if self.held != self.wanted || !self.cooldown_elapsed(now) {
            return false;
        }

        self.last_trigger = Some(now);
        self.held.clear();
        true
    }

    pub fn release(&mut self, token: KeyToken) {
        self.held.remove(&token);

        if !self.held.iter().any(|held| self.wanted.contains(held)) {
            self.held.clear();
        }
    }

    fn cooldown_elapsed(&self, now: Instant) -> bool {
        self.last_trigger
            .map(|last| now.saturating_duration_since(last) > self.cooldown)
            .unwrap_or(true)
    }
}
