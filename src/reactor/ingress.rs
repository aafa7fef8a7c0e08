//! The event-ingress surface.
//!
//! The wire protocol codec is an external collaborator; what reaches the
//! core is a stream of decoded events. Keeping this surface thin lets a
//! recorded event log drive the daemon exactly like a live uplink.

use async_trait::async_trait;
use std::io;

/// One decoded network event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    UserConnected {
        nick: String,
        ident: String,
        host: String,
    },
    UserQuit {
        nick: String,
    },
    NickChange {
        old: String,
        new: String,
    },
    Auth {
        nick: String,
        handle: String,
    },
    Join {
        nick: String,
        channel: String,
    },
    Part {
        nick: String,
        channel: String,
    },
    Kick {
        nick: String,
        channel: String,
    },
    Mode {
        actor: String,
        channel: String,
        words: Vec<String>,
    },
    Topic {
        actor: String,
        channel: String,
        topic: String,
    },
    Privmsg {
        from: String,
        target: String,
        text: String,
        qualified: bool,
    },
    BurstStart,
    BurstEnd,
    /// Clock control, emitted by the replay reader.
    TimeAdvance {
        now: u64,
    },
    /// The replay log ended.
    EndOfLog,
}

/// Where events come from: the live uplink or a trace reader. Exactly
/// one ingress drives the loop.
#[async_trait(?Send)]
pub trait Ingress {
    /// The next decoded event; `None` when the source is exhausted and
    /// the loop should stop.
    async fn next_event(&mut self) -> io::Result<Option<WireEvent>>;

    /// Emit one encoded action line toward the network. The replay
    /// ingress records these instead of sending.
    async fn send_line(&mut self, line: String) -> io::Result<()>;
}

/// Parse one decoded-event line (the format the trace recorder writes).
pub fn parse_event(line: &str) -> Option<WireEvent> {
    let line = line.trim_end();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let mut args = rest.split(' ');
    let trailing = |rest: &str| -> String {
        rest.split_once(" :")
            .map(|(_, t)| t.to_string())
            .unwrap_or_default()
    };
    match word {
        "TIME" => Some(WireEvent::TimeAdvance {
            now: args.next()?.parse().ok()?,
        }),
        "CONNECT" => Some(WireEvent::UserConnected {
            nick: args.next()?.to_string(),
            ident: args.next()?.to_string(),
            host: args.next()?.to_string(),
        }),
        "QUIT" => Some(WireEvent::UserQuit {
            nick: args.next()?.to_string(),
        }),
        "NICK" => Some(WireEvent::NickChange {
            old: args.next()?.to_string(),
            new: args.next()?.to_string(),
        }),
        "AUTH" => Some(WireEvent::Auth {
            nick: args.next()?.to_string(),
            handle: args.next()?.to_string(),
        }),
        "JOIN" => Some(WireEvent::Join {
            nick: args.next()?.to_string(),
            channel: args.next()?.to_string(),
        }),
        "PART" => Some(WireEvent::Part {
            nick: args.next()?.to_string(),
            channel: args.next()?.to_string(),
        }),
        "KICK" => Some(WireEvent::Kick {
            nick: args.next()?.to_string(),
            channel: args.next()?.to_string(),
        }),
        "MODE" => {
            let actor = args.next()?.to_string();
            let channel = args.next()?.to_string();
            let words: Vec<String> = args.map(str::to_string).collect();
            if words.is_empty() {
                return None;
            }
            Some(WireEvent::Mode {
                actor,
                channel,
                words,
            })
        }
        "TOPIC" => {
            let actor = args.next()?.to_string();
            let channel = args.next()?.to_string();
            Some(WireEvent::Topic {
                actor,
                channel,
                topic: trailing(rest),
            })
        }
        "PRIVMSG" | "SQUERY" => {
            let from = args.next()?.to_string();
            let target = args.next()?.to_string();
            Some(WireEvent::Privmsg {
                from,
                target,
                text: trailing(rest),
                qualified: word == "SQUERY",
            })
        }
        "BURST" => match args.next()? {
            "START" => Some(WireEvent::BurstStart),
            "END" => Some(WireEvent::BurstEnd),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_core_events() {
        assert_eq!(
            parse_event("JOIN alice #test"),
            Some(WireEvent::Join {
                nick: "alice".into(),
                channel: "#test".into()
            })
        );
        assert_eq!(
            parse_event("MODE alice #test +o bob"),
            Some(WireEvent::Mode {
                actor: "alice".into(),
                channel: "#test".into(),
                words: vec!["+o".into(), "bob".into()],
            })
        );
        assert_eq!(
            parse_event("PRIVMSG alice ChanServ :register #test"),
            Some(WireEvent::Privmsg {
                from: "alice".into(),
                target: "ChanServ".into(),
                text: "register #test".into(),
                qualified: false,
            })
        );
        assert_eq!(parse_event("TIME 1000"), Some(WireEvent::TimeAdvance { now: 1000 }));
        assert_eq!(parse_event("BURST END"), Some(WireEvent::BurstEnd));
    }

    #[test]
    fn comments_and_garbage_are_skipped() {
        assert_eq!(parse_event("# a comment"), None);
        assert_eq!(parse_event(""), None);
        assert_eq!(parse_event("WIBBLE x y"), None);
        assert_eq!(parse_event("JOIN onlynick"), None);
    }
}
