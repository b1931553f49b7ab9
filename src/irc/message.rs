//! IRC message parsing and serialization.
//!
//! Wire format (RFC 2812 §2.3.1):
//!
//! ```text
//! [':' prefix SPACE] command [SPACE middle]* [SPACE ':' trailing] CRLF
//! ```
//!
//! Parsed and constructed messages carry positional parameters plus a
//! read-only view of them by field name, derived from the command's
//! [`ParamSchema`].

use std::fmt;

use super::schema::{self, ParamSchema};

/// Originator of a message: `nick[!user]@host`, or a bare server name in `nick`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefix {
    pub nick: String,
    pub host: String,
    pub user: String,
}

impl Prefix {
    pub fn new(nick: impl Into<String>, host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            host: host.into(),
            user: user.into(),
        }
    }

    /// Parse `servername / ( nickname [ [ "!" user ] "@" host ] )`.
    ///
    /// `user` is only kept when a host is present, matching the grammar.
    pub fn parse(s: &str) -> Self {
        let (left, host) = match s.split_once('@') {
            Some((left, host)) => (left, Some(host)),
            None => (s, None),
        };
        let (nick, user) = match left.split_once('!') {
            Some((nick, user)) => (nick, Some(user)),
            None => (left, None),
        };

        match host {
            Some(host) => Prefix::new(nick, host, user.unwrap_or_default()),
            None => Prefix::new(nick, "", ""),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nick.is_empty()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nick.is_empty() {
            return Ok(());
        }
        f.write_str(&self.nick)?;
        if !self.host.is_empty() {
            if !self.user.is_empty() {
                write!(f, "!{}", self.user)?;
            }
            write!(f, "@{}", self.host)?;
        }
        Ok(())
    }
}

/// Errors that can occur while parsing a wire line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,
    #[error("prefix present but missing command")]
    MissingCommand,
}

/// Misuse of the message construction API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("unrecognized command: {0}")]
    UnknownCommand(String),
    #[error("too many keys ({keys}) to join ({channels}) channels")]
    TooManyKeys { keys: usize, channels: usize },
}

/// A single protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    prefix: Prefix,
    command: String,
    params: Vec<String>,
    schema: Option<&'static ParamSchema>,
}

impl Message {
    /// Build a message for `command` from named field values.
    ///
    /// Empty values are left unset. Reserved slots get a `*` placeholder.
    pub fn new(prefix: Prefix, command: &str, fields: &[(&str, &str)]) -> Result<Self, BuildError> {
        let schema = ParamSchema::lookup(command)
            .ok_or_else(|| BuildError::UnknownCommand(command.to_owned()))?;
        Ok(Self::with_schema(prefix, command, schema, fields))
    }

    /// Like [`Message::new`], for callers that already hold the schema.
    pub(crate) fn with_schema(
        prefix: Prefix,
        command: &str,
        schema: &'static ParamSchema,
        fields: &[(&str, &str)],
    ) -> Self {
        let params = schema
            .slots()
            .iter()
            .map(|slot| {
                if *slot == schema::UNUSED {
                    return schema::UNUSED_PLACEHOLDER.to_owned();
                }
                fields
                    .iter()
                    .find(|(name, value)| name == slot && !value.is_empty())
                    .map(|(_, value)| (*value).to_owned())
                    .unwrap_or_default()
            })
            .collect();

        Self {
            prefix,
            command: command.to_owned(),
            params,
            schema: Some(schema),
        }
    }

    /// Parse a single line, with or without its `\r\n` terminator.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = input.trim_end_matches(['\r', '\n']);
        if input.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let (prefix, rest) = match input.strip_prefix(':') {
            Some(tail) => match tail.split_once(' ') {
                Some((prefix, rest)) => (Prefix::parse(prefix), rest.trim_start_matches(' ')),
                None => return Err(ParseError::MissingCommand),
            },
            None => (Prefix::default(), input),
        };

        let (command, mut remaining) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }

        let mut params = Vec::new();
        loop {
            remaining = remaining.trim_start_matches(' ');
            if remaining.is_empty() {
                break;
            }
            if let Some(trailing) = remaining.strip_prefix(':') {
                // Trailing parameter: everything after the colon, spaces included.
                params.push(trailing.to_owned());
                break;
            }
            let (middle, tail) = remaining.split_once(' ').unwrap_or((remaining, ""));
            params.push(middle.to_owned());
            remaining = tail;
        }

        // Replies carry `target` plus free text that may have arrived as middles.
        if schema::is_numeric(command) && params.len() > 2 {
            let reply = params.split_off(1).join(" ");
            params.push(reply);
        }

        Ok(Self {
            prefix,
            command: command.to_owned(),
            params,
            schema: ParamSchema::lookup(command),
        })
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Raw positional parameters, including unset (empty) slots.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Value of a named field, if the command's schema has it and the slot exists.
    pub fn field(&self, name: &str) -> Option<&str> {
        let index = self.schema?.index_of(name)?;
        self.params.get(index).map(String::as_str)
    }

    /// All named fields whose slot is present, in positional order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        let slots = self.schema.map(ParamSchema::slots).unwrap_or_default();
        slots
            .iter()
            .zip(&self.params)
            .map(|(slot, value)| (*slot, value.as_str()))
    }

    /// Serialize to the wire format, terminated by `\r\n`.
    ///
    /// Parameters stop at the first empty slot; the last emitted one is
    /// always marked as trailing.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();

        if !self.prefix.is_empty() {
            out.push(':');
            out.push_str(&self.prefix.to_string());
            out.push(' ');
        }

        out.push_str(&self.command);

        let count = self
            .params
            .iter()
            .position(String::is_empty)
            .unwrap_or(self.params.len());
        for (i, param) in self.params[..count].iter().enumerate() {
            out.push(' ');
            if i + 1 == count {
                out.push(':');
            }
            out.push_str(param);
        }

        out.push_str("\r\n");
        out
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_wire().trim_end_matches("\r\n"))
    }
}
