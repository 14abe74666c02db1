mod controller;
mod loop_worker;

pub use controller::{HotkeyService, TriggerStats, TRIGGER_QUEUE_DEPTH};
pub use loop_worker::trigger_loop;
