pub mod listener;
pub mod tracker;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use listener::{KeyListener, TriggerCallback};
pub use tracker::{ChordTracker, KeyToken};

/// Modifier keys, in canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    Cmd,
    Ctrl,
    Alt,
    Shift,
}

impl Modifier {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "cmd" | "command" | "super" | "meta" | "win" => Some(Modifier::Cmd),
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" | "option" | "opt" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Cmd => "cmd",
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKey {
    Letter(char),
    Digit(char),
    Function(u8),
    Space,
}

impl TriggerKey {
    fn parse(token: &str) -> Option<Self> {
        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return match c {
                'a'..='z' => Some(TriggerKey::Letter(c)),
                '0'..='9' => Some(TriggerKey::Digit(c)),
                _ => None,
            };
        }

        if token == "space" {
            return Some(TriggerKey::Space);
        }

        token
            .strip_prefix('f')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=12).contains(n))
            .map(TriggerKey::Function)
    }

    fn is_bindable(&self) -> bool {
        match *self {
            TriggerKey::Letter(c) => c.is_ascii_lowercase(),
            TriggerKey::Digit(c) => c.is_ascii_digit(),
            TriggerKey::Function(n) => (1..=12).contains(&n),
            TriggerKey::Space => true,
        }
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKey::Letter(c) | TriggerKey::Digit(c) => write!(f, "{c}"),
            TriggerKey::Function(n) => write!(f, "f{n}"),
            TriggerKey::Space => f.write_str("space"),
        }
    }
}

/// Modifiers plus one trigger key, e.g. `cmd+x`.
///
/// Modifiers are kept sorted and unique so two bindings compare equal
/// regardless of the order they were written in. Serialized as its text form
/// and validated on the way back in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortcutBinding {
    modifiers: Vec<Modifier>,
    key: TriggerKey,
}

impl ShortcutBinding {
    pub fn new(mut modifiers: Vec<Modifier>, key: TriggerKey) -> Result<Self, ConfigError> {
        let spec = format_spec(&modifiers, &key);
        if modifiers.is_empty() {
            return Err(invalid(&spec, "at least one modifier is required"));
        }
        if !key.is_bindable() {
            return Err(invalid(&spec, "key cannot be bound"));
        }

        modifiers.sort();
        let before = modifiers.len();
        modifiers.dedup();
        if modifiers.len() != before {
            return Err(invalid(&spec, "modifier listed more than once"));
        }

        Ok(Self { modifiers, key })
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn key(&self) -> TriggerKey {
        self.key
    }

    /// Every key that must be held for the chord to fire.
    pub fn tokens(&self) -> Vec<KeyToken> {
        self.modifiers
            .iter()
            .copied()
            .map(KeyToken::Modifier)
            .chain(std::iter::once(KeyToken::Key(self.key)))
            .collect()
    }
}

impl Default for ShortcutBinding {
    fn default() -> Self {
        Self {
            modifiers: vec![Modifier::Cmd],
            key: TriggerKey::Letter('x'),
        }
    }
}

impl FromStr for ShortcutBinding {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let normalized = spec.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(invalid(spec, "empty shortcut"));
        }

        let tokens: Vec<&str> = normalized.split('+').map(str::trim).collect();
        let Some((key_token, modifier_tokens)) = tokens.split_last() else {
            return Err(invalid(spec, "empty shortcut"));
        };

        let mut modifiers = Vec::with_capacity(modifier_tokens.len());
        for token in modifier_tokens {
            let modifier = Modifier::parse(token)
                .ok_or_else(|| invalid(spec, &format!("unrecognized modifier '{token}'")))?;
            modifiers.push(modifier);
        }

        let key = TriggerKey::parse(key_token)
            .ok_or_else(|| invalid(spec, &format!("unrecognized key '{key_token}'")))?;

        ShortcutBinding::new(modifiers, key).map_err(|_| {
            if modifier_tokens.is_empty() {
                invalid(spec, "at least one modifier is required")
            } else {
                invalid(spec, "modifier listed more than once")
            }
        })
    }
}

impl TryFrom<String> for ShortcutBinding {
    type Error = ConfigError;

    fn try_from(spec: String) -> Result<Self, Self::Error> {
        spec.parse()
    }
}

impl From<ShortcutBinding> for String {
    fn from(binding: ShortcutBinding) -> Self {
        binding.to_string()
    }
}

impl fmt::Display for ShortcutBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_spec(&self.modifiers, &self.key))
    }
}

fn format_spec(modifiers: &[Modifier], key: &TriggerKey) -> String {
    let mut parts: Vec<String> = modifiers.iter().map(|m| m.as_str().to_string()).collect();
    parts.push(key.to_string());
    parts.join("+")
}

fn invalid(spec: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidShortcut {
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}
