//! Constructors for the commands the client sends.
//!
//! Each builder maps its arguments onto the command's [`schema`] fields.
//! References are to RFC 2812.

use super::message::{BuildError, Message, Prefix};
use super::schema;

/// `PASS <password>` (§3.1.1)
pub fn pass(prefix: Prefix, password: &str) -> Message {
    Message::with_schema(prefix, "PASS", &schema::PASS, &[("password", password)])
}

/// `NICK <nick>` (§3.1.2)
pub fn nick(prefix: Prefix, nick: &str) -> Message {
    Message::with_schema(prefix, "NICK", &schema::NICK, &[("nick", nick)])
}

/// `USER <user> <mode> * :<realname>` (§3.1.3)
pub fn user(prefix: Prefix, user: &str, mode: &str, realname: &str) -> Message {
    Message::with_schema(
        prefix,
        "USER",
        &schema::USER,
        &[("user", user), ("mode", mode), ("realname", realname)],
    )
}

/// `QUIT [:<message>]` (§3.1.7)
pub fn quit(prefix: Prefix, message: &str) -> Message {
    Message::with_schema(prefix, "QUIT", &schema::QUIT, &[("message", message)])
}

/// `JOIN <channel>{,<channel>} [<key>{,<key>}]` (§3.2.1)
///
/// An empty channel list becomes the literal channel `0`.
pub fn join<S: AsRef<str>>(prefix: Prefix, channels: &[S], keys: &[S]) -> Result<Message, BuildError> {
    if keys.len() > channels.len() {
        return Err(BuildError::TooManyKeys {
            keys: keys.len(),
            channels: channels.len(),
        });
    }

    let channels = if channels.is_empty() {
        "0".to_owned()
    } else {
        comma_join(channels)
    };
    let keys = comma_join(keys);

    Ok(Message::with_schema(
        prefix,
        "JOIN",
        &schema::JOIN,
        &[("channels", channels.as_str()), ("keys", keys.as_str())],
    ))
}

/// `PRIVMSG <msgtarget> :<text>` (§3.3.1)
pub fn privmsg(prefix: Prefix, target: &str, text: &str) -> Message {
    Message::with_schema(
        prefix,
        "PRIVMSG",
        &schema::PRIVMSG,
        &[("msgtarget", target), ("text", text)],
    )
}

/// `PING <server1> [<server2>]` (§3.7.2)
pub fn ping(prefix: Prefix, server1: &str, server2: &str) -> Message {
    Message::with_schema(
        prefix,
        "PING",
        &schema::PING,
        &[("server1", server1), ("server2", server2)],
    )
}

/// `PONG <server> [<server2>]` (§3.7.3)
pub fn pong(prefix: Prefix, server: &str, server2: &str) -> Message {
    Message::with_schema(
        prefix,
        "PONG",
        &schema::PONG,
        &[("server", server), ("server2", server2)],
    )
}

fn comma_join<S: AsRef<str>>(items: &[S]) -> String {
    items.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn none() -> Prefix {
        Prefix::default()
    }

    #[test]
    fn registration_messages() {
        assert_eq!(pass(none(), "secret").to_wire(), "PASS :secret\r\n");
        assert_eq!(nick(none(), "botn").to_wire(), "NICK :botn\r\n");
        assert_eq!(
            user(none(), "botu", "0", "cool guy").to_wire(),
            "USER botu 0 * :cool guy\r\n"
        );
    }

    #[test]
    fn quit_with_and_without_reason() {
        assert_eq!(quit(none(), "bye all").to_wire(), "QUIT :bye all\r\n");
        assert_eq!(quit(none(), "").to_wire(), "QUIT\r\n");
    }

    #[test]
    fn join_channels_and_keys() {
        let msg = join(none(), &["#a", "#b", "#c"], &["k1", "k2"]).unwrap();
        assert_eq!(msg.field("channels"), Some("#a,#b,#c"));
        assert_eq!(msg.field("keys"), Some("k1,k2"));
        assert_eq!(msg.to_wire(), "JOIN #a,#b,#c :k1,k2\r\n");
    }

    #[test]
    fn join_without_keys() {
        let msg = join::<&str>(none(), &["#general"], &[]).unwrap();
        assert_eq!(msg.to_wire(), "JOIN :#general\r\n");
    }

    #[test]
    fn join_no_channels_is_zero() {
        let msg = join::<String>(none(), &[], &[]).unwrap();
        assert_eq!(msg.to_wire(), "JOIN :0\r\n");
    }

    #[test]
    fn join_rejects_extra_keys() {
        let err = join(none(), &["#a"], &["k1", "k2"]).unwrap_err();
        assert_eq!(err, BuildError::TooManyKeys { keys: 2, channels: 1 });
    }

    #[test]
    fn privmsg_example() {
        assert_eq!(
            privmsg(none(), "#general", "hello #general").to_wire(),
            "PRIVMSG #general :hello #general\r\n"
        );
    }

    #[test]
    fn ping_pong() {
        assert_eq!(ping(none(), "server1", "").to_wire(), "PING :server1\r\n");
        assert_eq!(ping(none(), "a", "b").to_wire(), "PING a :b\r\n");
        let pong = pong(none(), "server1", "");
        assert_eq!(pong.field("server"), Some("server1"));
        assert_eq!(pong.to_wire(), "PONG :server1\r\n");
    }
}
