use std::sync::Arc;

use crate::error::ConfigError;

use super::ShortcutBinding;

/// Invoked once per detected chord, from the listener's own thread.
pub type TriggerCallback = Arc<dyn Fn() + Send + Sync>;

/// A system-wide keyboard hook.
///
/// `start` must return promptly: backends run their event loop on a thread
/// they own and call `on_trigger` from it.
pub trait KeyListener: Send {
    fn name(&self) -> &'static str;

    fn start(
        &mut self,
        binding: ShortcutBinding,
        on_trigger: TriggerCallback,
    ) -> Result<(), ConfigError>;

    /// Stops delivering triggers to the callback given to `start`.
    fn stop(&mut self) {}
}

/// The listener compiled into this build, if any.
pub fn default_listener() -> Result<Box<dyn KeyListener>, ConfigError> {
    #[cfg(feature = "listener")]
    {
        Ok(Box::new(rdev_backend::RdevListener::new()))
    }

    #[cfg(not(feature = "listener"))]
    {
        Err(ConfigError::NoListenerBackend)
    }
}

#[cfg(feature = "listener")]
pub mod rdev_backend {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use rdev::{EventType, Key};

    use super::{KeyListener, TriggerCallback};
    use crate::error::ConfigError;
    use crate::shortcut::{ChordTracker, KeyToken, Modifier, ShortcutBinding, TriggerKey};

    const ENABLE_LOGS: bool = true;

    use crate::{log_error, log_info};

    /// How long `start` waits for the hook to report an immediate failure
    /// (no X display, accessibility permission missing).
    const STARTUP_GRACE: Duration = Duration::from_millis(300);

    /// What the installed hook currently delivers to.
    struct Route {
        tracker: ChordTracker,
        on_trigger: TriggerCallback,
    }

    // `rdev::listen` never returns once installed, so there is one hook per
    // process and every start/stop swaps the route it feeds.
    static ROUTE: Mutex<Option<Route>> = Mutex::new(None);
    static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

    /// Global hook backed by `rdev` (CGEventTap on macOS, XRecord on X11,
    /// low-level hook on Windows).
    #[derive(Default)]
    pub struct RdevListener;

    impl RdevListener {
        pub fn new() -> Self {
            Self
        }
    }

    impl KeyListener for RdevListener {
        fn name(&self) -> &'static str {
            "rdev"
        }

        fn start(
            &mut self,
            binding: ShortcutBinding,
            on_trigger: TriggerCallback,
        ) -> Result<(), ConfigError> {
            set_route(Some(Route {
                tracker: ChordTracker::new(&binding),
                on_trigger,
            }));

            if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
                log_info!("keyboard hook now listening for '{}'", binding);
                return Ok(());
            }

            let (err_tx, err_rx) = mpsc::channel::<String>();

            let spawned = thread::Builder::new()
                .name("avr-key-listener".to_string())
                .spawn(move || {
                    log_info!("keyboard hook installed for '{}'", binding);
                    let result = rdev::listen(|event| {
                        handle_event(event.event_type, Instant::now());
                    });

                    if let Err(err) = result {
                        HOOK_INSTALLED.store(false, Ordering::SeqCst);
                        log_error!("keyboard hook stopped: {err:?}");
                        let _ = err_tx.send(format!("{err:?}"));
                    }
                });

            if let Err(err) = spawned {
                HOOK_INSTALLED.store(false, Ordering::SeqCst);
                set_route(None);
                return Err(ConfigError::ListenerUnavailable {
                    reason: err.to_string(),
                });
            }

            match err_rx.recv_timeout(STARTUP_GRACE) {
                Ok(reason) => {
                    set_route(None);
                    Err(ConfigError::ListenerUnavailable { reason })
                }
                Err(_) => Ok(()),
            }
        }

        fn stop(&mut self) {
            set_route(None);
        }
    }

    fn set_route(route: Option<Route>) {
        match ROUTE.lock() {
            Ok(mut guard) => *guard = route,
            Err(poisoned) => *poisoned.into_inner() = route,
        }
    }

    /// Feeds one hook event to the current route. Returns true when it fired
    /// the callback, which runs after the route lock is released.
    fn handle_event(event: EventType, now: Instant) -> bool {
        let on_trigger = {
            let Ok(mut guard) = ROUTE.lock() else {
                return false;
            };
            let Some(route) = guard.as_mut() else {
                return false;
            };

            match event {
                EventType::KeyPress(key) => match key_token(key) {
                    Some(token) if route.tracker.press(token, now) => Arc::clone(&route.on_trigger),
                    _ => return false,
                },
                EventType::KeyRelease(key) => {
                    if let Some(token) = key_token(key) {
                        route.tracker.release(token);
                    }
                    return false;
                }
                _ => return false,
            }
        };

        on_trigger();
        true
    }

    fn key_token(key: Key) -> Option<KeyToken> {
        let token = match key {
            Key::MetaLeft | Key::MetaRight => KeyToken::Modifier(Modifier::Cmd),
            Key::ControlLeft | Key::ControlRight => KeyToken::Modifier(Modifier::Ctrl),
            Key::Alt | Key::AltGr => KeyToken::Modifier(Modifier::Alt),
            Key::ShiftLeft | Key::ShiftRight => KeyToken::Modifier(Modifier::Shift),
            Key::Space => KeyToken::Key(TriggerKey::Space),
            other => return letter_or_digit(other).or_else(|| function_key(other)),
        };
        Some(token)
    }

    fn letter_or_digit(key: Key) -> Option<KeyToken> {
        let c = match key {
            Key::KeyA => 'a',
            Key::KeyB => 'b',
            Key::KeyC => 'c',
            Key::KeyD => 'd',
            Key::KeyE => 'e',
            Key::KeyF => 'f',
            Key::KeyG => 'g',
            Key::KeyH => 'h',
            Key::KeyI => 'i',
            Key::KeyJ => 'j',
            Key::KeyK => 'k',
            Key::KeyL => 'l',
            Key::KeyM => 'm',
            Key::KeyN => 'n',
            Key::KeyO => 'o',
            Key::KeyP => 'p',
            Key::KeyQ => 'q',
            Key::KeyR => 'r',
            Key::KeyS => 's',
            Key::KeyT => 't',
            Key::KeyU => 'u',
            Key::KeyV => 'v',
            Key::KeyW => 'w',
            Key::KeyX => 'x',
            Key::KeyY => 'y',
            Key::KeyZ => 'z',
            Key::Num0 => '0',
            Key::Num1 => '1',
            Key::Num2 => '2',
            Key::Num3 => '3',
            Key::Num4 => '4',
            Key::Num5 => '5',
            Key::Num6 => '6',
            Key::Num7 => '7',
            Key::Num8 => '8',
            Key::Num9 => '9',
            _ => return None,
        };

        Some(if c.is_ascii_digit() {
            KeyToken::Key(TriggerKey::Digit(c))
        } else {
            KeyToken::Key(TriggerKey::Letter(c))
        })
    }

    fn function_key(key: Key) -> Option<KeyToken> {
        let n = match key {
            Key::F1 => 1,
            Key::F2 => 2,
            Key::F3 => 3,
            Key::F4 => 4,
            Key::F5 => 5,
            Key::F6 => 6,
            Key::F7 => 7,
            Key::F8 => 8,
            Key::F9 => 9,
            Key::F10 => 10,
            Key::F11 => 11,
            Key::F12 => 12,
            _ => return None,
        };
        Some(KeyToken::Key(TriggerKey::Function(n)))
    }

}
