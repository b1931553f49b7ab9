//! Per-command parameter schemas.
//!
//! Each known command maps its positional parameters onto semantic field
//! names (`PRIVMSG` → `msgtarget`, `text`). Numeric replies share a single
//! `target` / `reply` schema. The table is built once and never mutated.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Field name for a reserved slot that is filled with a placeholder on construction.
pub const UNUSED: &str = "_";

/// Placeholder written into [`UNUSED`] slots (RFC 2812 §3.1.3).
pub const UNUSED_PLACEHOLDER: &str = "*";

/// Ordered positional slot names for one command.
#[derive(Debug, PartialEq, Eq)]
pub struct ParamSchema {
    slots: &'static [&'static str],
}

impl ParamSchema {
    const fn new(slots: &'static [&'static str]) -> Self {
        Self { slots }
    }

    /// Slot names in positional order.
    pub fn slots(&self) -> &'static [&'static str] {
        self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Position of `field`, if this schema names it.
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.slots.iter().position(|slot| *slot == field)
    }

    /// Look up the schema for `command`, falling back to [`REPLY`] for numerics.
    pub fn lookup(command: &str) -> Option<&'static ParamSchema> {
        REGISTRY
            .get(command)
            .copied()
            .or_else(|| is_numeric(command).then_some(&REPLY))
    }
}

// Connection registration
pub static PASS: ParamSchema = ParamSchema::new(&["password"]);
pub static NICK: ParamSchema = ParamSchema::new(&["nick"]);
pub static USER: ParamSchema = ParamSchema::new(&["user", "mode", UNUSED, "realname"]);
pub static QUIT: ParamSchema = ParamSchema::new(&["message"]);
// Channel operations
pub static JOIN: ParamSchema = ParamSchema::new(&["channels", "keys"]);
// Sending messages
pub static PRIVMSG: ParamSchema = ParamSchema::new(&["msgtarget", "text"]);
// Miscellaneous
pub static PING: ParamSchema = ParamSchema::new(&["server1", "server2"]);
pub static PONG: ParamSchema = ParamSchema::new(&["server", "server2"]);

/// Shared schema for all numeric replies.
pub static REPLY: ParamSchema = ParamSchema::new(&["target", "reply"]);

static REGISTRY: LazyLock<HashMap<&'static str, &'static ParamSchema>> = LazyLock::new(|| {
    HashMap::from([
        ("PASS", &PASS),
        ("NICK", &NICK),
        ("USER", &USER),
        ("QUIT", &QUIT),
        ("JOIN", &JOIN),
        ("PRIVMSG", &PRIVMSG),
        ("PING", &PING),
        ("PONG", &PONG),
    ])
});

/// Whether `command` is a numeric reply code (all ASCII digits).
pub fn is_numeric(command: &str) -> bool {
    !command.is_empty() && command.bytes().all(|b| b.is_ascii_digit())
}
