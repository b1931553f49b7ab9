//! A small asynchronous IRC client.
//!
//! [`irc::Client`] owns one server connection: it registers with
//! `PASS`/`NICK`/`USER`, answers `PING`, and forwards everything else to a
//! caller-supplied channel.

pub mod config;
pub mod irc;
pub mod logging;
