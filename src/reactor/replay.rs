//! Replay ingress: drive the core from a recorded event log.
//!
//! The log is the decoded-event line format; `TIME` records advance the
//! virtual clock so timers fire deterministically. Outbound actions are
//! logged instead of sent.

use super::ingress::{parse_event, Ingress, WireEvent};
use async_trait::async_trait;
use std::io::{self, BufRead};
use tracing::debug;

pub struct Replay {
    lines: std::io::Lines<std::io::BufReader<std::fs::File>>,
    finished: bool,
}

impl Replay {
    pub fn open(path: &str) -> io::Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self {
            lines: std::io::BufReader::new(file).lines(),
            finished: false,
        })
    }
}

#[async_trait(?Send)]
impl Ingress for Replay {
    async fn next_event(&mut self) -> io::Result<Option<WireEvent>> {
        if self.finished {
            return Ok(None);
        }
        for line in self.lines.by_ref() {
            let line = line?;
            if let Some(event) = parse_event(&line) {
                return Ok(Some(event));
            }
        }
        self.finished = true;
        Ok(Some(WireEvent::EndOfLog))
    }

    async fn send_line(&mut self, line: String) -> io::Result<()> {
        debug!(target: "replay", line = %line, "Suppressed outbound line");
        Ok(())
    }
}
