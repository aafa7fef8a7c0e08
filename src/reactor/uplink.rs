//! The uplink connection manager.
//!
//! Tries configured uplinks in order, giving each `max_tries` attempts
//! and cycling through the list up to `max_cycles` times before giving
//! up. The link carries line-framed decoded events.

use super::ingress::{parse_event, Ingress, WireEvent};
use crate::conf::{Config, UplinkConf};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::io;
use tokio::net::{TcpSocket, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{info, warn};

pub struct Uplink {
    uplinks: Vec<UplinkConf>,
    max_cycles: u32,
    framed: Option<Framed<TcpStream, LinesCodec>>,
}

impl Uplink {
    pub fn new(conf: &Config) -> Self {
        Self {
            uplinks: conf.uplinks.iter().filter(|u| u.enabled).cloned().collect(),
            max_cycles: conf.uplink_max_cycles,
            framed: None,
        }
    }

    async fn try_connect(uplink: &UplinkConf) -> io::Result<TcpStream> {
        let addr = format!("{}:{}", uplink.address, uplink.port);
        let addr: std::net::SocketAddr = addr
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{}: {}", addr, e)))?;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        if let Some(ref bind) = uplink.bind_address {
            let bind: std::net::SocketAddr = format!("{}:0", bind)
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{}", e)))?;
            socket.bind(bind)?;
        }
        socket.connect(addr).await
    }

    /// Cycle through the uplink list until something answers.
    pub async fn connect(&mut self) -> io::Result<()> {
        if self.uplinks.is_empty() {
            return Err(io::Error::other("no enabled uplinks configured"));
        }
        for cycle in 0..self.max_cycles.max(1) {
            for uplink in &self.uplinks {
                for attempt in 1..=uplink.max_tries.max(1) {
                    match Self::try_connect(uplink).await {
                        Ok(stream) => {
                            info!(uplink = %uplink.name, cycle, attempt, "Uplink connected");
                            let mut framed = Framed::new(stream, LinesCodec::new());
                            if !uplink.password.is_empty() {
                                framed
                                    .send(format!("PASS :{}", uplink.password))
                                    .await
                                    .map_err(io::Error::other)?;
                            }
                            self.framed = Some(framed);
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(uplink = %uplink.name, attempt, error = %e, "Uplink connect failed");
                        }
                    }
                }
            }
        }
        Err(io::Error::other("all uplinks exhausted"))
    }

    /// Drop the link and find another uplink.
    pub async fn cycle(&mut self) -> io::Result<()> {
        self.framed = None;
        self.connect().await
    }
}

#[async_trait(?Send)]
impl Ingress for Uplink {
    async fn next_event(&mut self) -> io::Result<Option<WireEvent>> {
        loop {
            let Some(framed) = self.framed.as_mut() else {
                self.connect().await?;
                continue;
            };
            match framed.next().await {
                Some(Ok(line)) => {
                    if let Some(event) = parse_event(&line) {
                        return Ok(Some(event));
                    }
                    // Undecodable lines are the codec's problem; skip.
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Uplink read error; cycling");
                    self.cycle().await?;
                }
                None => {
                    warn!("Uplink closed; cycling");
                    self.cycle().await?;
                }
            }
        }
    }

    async fn send_line(&mut self, line: String) -> io::Result<()> {
        match self.framed.as_mut() {
            Some(framed) => framed.send(line).await.map_err(io::Error::other),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no uplink")),
        }
    }
}
