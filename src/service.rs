// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Async service wrapper around a [`MulticastInterface`].
//!
//! One task owns each interface context. Callers talk to it through an
//! [`InterfaceHandle`] over an mpsc channel; a tokio interval drives the
//! MLD timer wheel. The task owns the MAC filter driver and MLD sender,
//! so no locking is needed around reception state.

use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::MissedTickBehavior;

use crate::config::NodeConfig;
use crate::error::MulticastError;
use crate::interface::{MldSender, MulticastInterface};
use crate::logging::{Facility, Logger};
use crate::mac::MacFilterDriver;
use crate::protocols::MldVersion;
use crate::socket::SocketTable;
use crate::{log_debug, log_info};

/// Socket table shared between the service task and the socket layer
pub type SharedSockets = Arc<Mutex<SocketTable>>;

/// Commands accepted by an interface service task
#[derive(Debug)]
pub enum InterfaceCommand {
    /// Any-source join for a group
    Join {
        group: Ipv6Addr,
        reply: oneshot::Sender<Result<(), MulticastError>>,
    },
    /// Any-source leave for a group
    Leave {
        group: Ipv6Addr,
        reply: oneshot::Sender<Result<(), MulticastError>>,
    },
    /// Socket filters changed; re-derive reception state
    MembershipChanged { group: Option<Ipv6Addr> },
    /// An MLD query arrived on the interface
    QueryReceived {
        version: MldVersion,
        group: Option<Ipv6Addr>,
        sources: Vec<Ipv6Addr>,
        max_resp_delay: Duration,
    },
    /// The link went up or down
    LinkChanged { up: bool },
    /// A usable link-local source address appeared or vanished
    LinkLocalAvailable { available: bool },
    /// Does the reception filter pass this (group, source) pair?
    Accepts {
        group: Ipv6Addr,
        source: Ipv6Addr,
        reply: oneshot::Sender<bool>,
    },
    /// Stop the service task
    Shutdown,
}

/// Cheap clonable handle to a running interface service
#[derive(Clone)]
pub struct InterfaceHandle {
    tx: mpsc::Sender<InterfaceCommand>,
}

impl InterfaceHandle {
    pub async fn join(&self, group: Ipv6Addr) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(InterfaceCommand::Join { group, reply }).await?;
        rx.await??;
        Ok(())
    }

    pub async fn leave(&self, group: Ipv6Addr) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(InterfaceCommand::Leave { group, reply })
            .await?;
        rx.await??;
        Ok(())
    }

    pub async fn membership_changed(&self, group: Option<Ipv6Addr>) -> Result<()> {
        self.tx
            .send(InterfaceCommand::MembershipChanged { group })
            .await?;
        Ok(())
    }

    pub async fn query_received(
        &self,
        version: MldVersion,
        group: Option<Ipv6Addr>,
        sources: Vec<Ipv6Addr>,
        max_resp_delay: Duration,
    ) -> Result<()> {
        self.tx
            .send(InterfaceCommand::QueryReceived {
                version,
                group,
                sources,
                max_resp_delay,
            })
            .await?;
        Ok(())
    }

    pub async fn link_changed(&self, up: bool) -> Result<()> {
        self.tx.send(InterfaceCommand::LinkChanged { up }).await?;
        Ok(())
    }

    pub async fn link_local_available(&self, available: bool) -> Result<()> {
        self.tx
            .send(InterfaceCommand::LinkLocalAvailable { available })
            .await?;
        Ok(())
    }

    pub async fn accepts(&self, group: Ipv6Addr, source: Ipv6Addr) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(InterfaceCommand::Accepts {
                group,
                source,
                reply,
            })
            .await?;
        Ok(rx.await?)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(InterfaceCommand::Shutdown).await?;
        Ok(())
    }
}

/// Service task owning one interface's multicast state
pub struct InterfaceService<D, S> {
    interface: MulticastInterface,
    sockets: SharedSockets,
    driver: D,
    sender: S,
    tick_interval: Duration,
    rx: mpsc::Receiver<InterfaceCommand>,
    logger: Logger,
    rng: StdRng,
}

impl<D, S> InterfaceService<D, S>
where
    D: MacFilterDriver + Send + 'static,
    S: MldSender + Send + 'static,
{
    /// Spawn the service task, returning its handle
    pub fn spawn(
        name: &str,
        config: &NodeConfig,
        sockets: SharedSockets,
        driver: D,
        sender: S,
        logger: Logger,
    ) -> InterfaceHandle {
        let (tx, rx) = mpsc::channel(64);
        let service = InterfaceService {
            interface: MulticastInterface::new(name, config, logger.clone()),
            sockets,
            driver,
            sender,
            tick_interval: config.mld.tick_interval(),
            rx,
            logger,
            rng: StdRng::from_entropy(),
        };
        tokio::spawn(service.run());
        InterfaceHandle { tx }
    }

    async fn run(mut self) {
        log_info!(
            self.logger,
            Facility::Service,
            "{}: multicast service started",
            self.interface.name()
        );
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.interface
                        .tick(&mut self.sender, Instant::now(), &mut self.rng);
                }
                command = self.rx.recv() => {
                    match command {
                        None => break,
                        Some(InterfaceCommand::Shutdown) => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
            }
        }
        log_info!(
            self.logger,
            Facility::Service,
            "{}: multicast service stopped",
            self.interface.name()
        );
    }

    async fn handle_command(&mut self, command: InterfaceCommand) {
        let now = Instant::now();
        match command {
            InterfaceCommand::Join { group, reply } => {
                let sockets = self.sockets.lock().await;
                let result = self.interface.join_multicast_group(
                    group,
                    &*sockets,
                    &mut self.driver,
                    &mut self.sender,
                    now,
                    &mut self.rng,
                );
                let _ = reply.send(result);
            }
            InterfaceCommand::Leave { group, reply } => {
                let sockets = self.sockets.lock().await;
                let result = self.interface.leave_multicast_group(
                    group,
                    &*sockets,
                    &mut self.driver,
                    &mut self.sender,
                    now,
                    &mut self.rng,
                );
                let _ = reply.send(result);
            }
            InterfaceCommand::MembershipChanged { group } => {
                let sockets = self.sockets.lock().await;
                self.interface.membership_changed(
                    group,
                    &*sockets,
                    &mut self.driver,
                    &mut self.sender,
                    now,
                    &mut self.rng,
                );
            }
            InterfaceCommand::QueryReceived {
                version,
                group,
                sources,
                max_resp_delay,
            } => {
                self.interface.process_query(
                    version,
                    group,
                    sources,
                    max_resp_delay,
                    &mut self.sender,
                    now,
                    &mut self.rng,
                );
            }
            InterfaceCommand::LinkChanged { up } => {
                self.interface.link_changed(up, now, &mut self.rng);
            }
            InterfaceCommand::LinkLocalAvailable { available } => {
                log_debug!(
                    self.logger,
                    Facility::Service,
                    "{}: link-local source {}",
                    self.interface.name(),
                    if available { "available" } else { "lost" }
                );
                self.interface.set_link_local_available(available);
            }
            InterfaceCommand::Accepts {
                group,
                source,
                reply,
            } => {
                let _ = reply.send(self.interface.accepts(group, source));
            }
            InterfaceCommand::Shutdown => unreachable!("handled in the select loop"),
        }
    }
}
