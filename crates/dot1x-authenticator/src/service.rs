//! Tokio runtime around the engine
//!
//! The engine loop owns the [`Authenticator`] and processes inbound
//! messages, controller commands and timer deadlines one at a time,
//! yielding after each. Each endpoint has a reader task feeding the engine
//! and a writer task draining the engine's output, so a full inbound queue
//! never stops outbound traffic.
//!
//! A malformed message only costs that message. A socket failure ends its
//! task and [`AuthenticatorService::run`] returns the transport error.

use crate::authenticator::{Authenticator, Outbound};
use crate::error::AuthenticatorError;
use crate::link::LinkSocket;
use dot1x_proto::MacAddress;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[cfg(target_os = "linux")]
use crate::{audit::AuditLogger, config::Config, handler::AuthEventHandler};

const QUEUE_DEPTH: usize = 256;
const MAX_FRAME: usize = 9216;
const MAX_RADIUS_PACKET: usize = 4096;

enum Inbound {
    Eapol(Vec<u8>),
    Radius(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    PortUp(MacAddress),
    PortDown(MacAddress),
    Shutdown,
}

/// Control surface for the controller that owns the switch ports
#[derive(Debug, Clone)]
pub struct AuthenticatorHandle {
    commands: mpsc::Sender<Command>,
}

impl AuthenticatorHandle {
    pub async fn port_up(&self, port: MacAddress) -> Result<(), AuthenticatorError> {
        self.send(Command::PortUp(port)).await
    }

    pub async fn port_down(&self, port: MacAddress) -> Result<(), AuthenticatorError> {
        self.send(Command::PortDown(port)).await
    }

    /// Ask the service to stop; `run` then returns `Ok(())`
    pub async fn shutdown(&self) -> Result<(), AuthenticatorError> {
        self.send(Command::Shutdown).await
    }

    async fn send(&self, command: Command) -> Result<(), AuthenticatorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AuthenticatorError::Closed)
    }
}

pub struct AuthenticatorService {
    engine: Authenticator,
    link: Arc<dyn LinkSocket>,
    radius: Arc<UdpSocket>,
    server: SocketAddr,
    commands: mpsc::Receiver<Command>,
    handle: AuthenticatorHandle,
}

impl AuthenticatorService {
    pub fn new(
        engine: Authenticator,
        link: Arc<dyn LinkSocket>,
        radius: UdpSocket,
        server: SocketAddr,
    ) -> Self {
        let (tx, commands) = mpsc::channel(QUEUE_DEPTH);
        AuthenticatorService {
            engine,
            link,
            radius: Arc::new(radius),
            server,
            commands,
            handle: AuthenticatorHandle { commands: tx },
        }
    }

    /// Open the interface and RADIUS sockets described by `config`
    #[cfg(target_os = "linux")]
    pub async fn bind(
        config: &Config,
        handler: Arc<dyn AuthEventHandler>,
        audit: AuditLogger,
    ) -> Result<Self, AuthenticatorError> {
        use crate::authenticator::AuthenticatorSettings;
        use crate::link::AfPacketSocket;

        let link = AfPacketSocket::bind(&config.interface)?;
        let settings = AuthenticatorSettings::from_config(config, link.hardware_address());
        let engine = Authenticator::new(settings, handler).with_audit(audit);

        let radius = UdpSocket::bind(config.radius_listen_addr()?).await?;
        Ok(Self::new(
            engine,
            Arc::new(link),
            radius,
            config.radius_server_addr()?,
        ))
    }

    pub fn handle(&self) -> AuthenticatorHandle {
        self.handle.clone()
    }

    /// Local address of the RADIUS socket
    pub fn radius_local_addr(&self) -> Result<SocketAddr, AuthenticatorError> {
        self.radius.local_addr().map_err(AuthenticatorError::from)
    }

    /// Run until shut down or until a socket fails
    pub async fn run(self) -> Result<(), AuthenticatorError> {
        let AuthenticatorService {
            mut engine,
            link,
            radius,
            server,
            mut commands,
            handle: _handle,
        } = self;

        let (inbound_tx, mut inbound_rx) = mpsc::channel(QUEUE_DEPTH);
        let (eapol_tx, eapol_rx) = mpsc::channel(QUEUE_DEPTH);
        let (radius_tx, radius_rx) = mpsc::channel(QUEUE_DEPTH);

        let mut tasks = JoinSet::new();
        tasks.spawn(link_reader(link.clone(), inbound_tx.clone()));
        tasks.spawn(link_writer(link, eapol_rx));
        tasks.spawn(radius_reader(radius.clone(), server, inbound_tx));
        tasks.spawn(radius_writer(radius, server, radius_rx));

        info!(radius_server = %server, "Authenticator running");

        let result = loop {
            let deadline = engine.next_deadline();

            let out = tokio::select! {
                Some(message) = inbound_rx.recv() => {
                    let now = now();
                    match message {
                        Inbound::Eapol(frame) => engine.handle_eapol(&frame, now),
                        Inbound::Radius(packet) => engine.handle_radius(&packet, now),
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::PortUp(port)) => engine.port_up(port, now()),
                    Some(Command::PortDown(port)) => engine.port_down(port, now()),
                    Some(Command::Shutdown) | None => break Ok(()),
                },
                _ = sleep_until(deadline) => engine.fire_timers(now()),
                Some(res) = tasks.join_next() => break Err(task_error(res)),
            };

            for message in out {
                let queued = match message {
                    Outbound::Eapol(frame) => eapol_tx.send(frame).await.is_ok(),
                    Outbound::Radius(packet) => radius_tx.send(packet).await.is_ok(),
                };
                if !queued {
                    debug!("Outbound queue closed");
                }
            }

            tokio::task::yield_now().await;
        };

        tasks.abort_all();
        info!("Authenticator stopped");
        result
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

fn task_error(res: Result<Result<(), AuthenticatorError>, tokio::task::JoinError>) -> AuthenticatorError {
    match res {
        Ok(Err(e)) => e,
        Ok(Ok(())) => AuthenticatorError::TaskFailed("I/O task ended".to_string()),
        Err(e) => AuthenticatorError::TaskFailed(e.to_string()),
    }
}

async fn link_reader(
    link: Arc<dyn LinkSocket>,
    inbound: mpsc::Sender<Inbound>,
) -> Result<(), AuthenticatorError> {
    let mut buf = vec![0u8; MAX_FRAME];
    loop {
        let len = link
            .recv(&mut buf)
            .await
            .map_err(|e| AuthenticatorError::transport("eapol", e))?;
        if inbound.send(Inbound::Eapol(buf[..len].to_vec())).await.is_err() {
            return Ok(());
        }
    }
}

async fn link_writer(
    link: Arc<dyn LinkSocket>,
    mut outbound: mpsc::Receiver<Vec<u8>>,
) -> Result<(), AuthenticatorError> {
    while let Some(frame) = outbound.recv().await {
        link.send(&frame)
            .await
            .map_err(|e| AuthenticatorError::transport("eapol", e))?;
    }
    Ok(())
}

async fn radius_reader(
    socket: Arc<UdpSocket>,
    server: SocketAddr,
    inbound: mpsc::Sender<Inbound>,
) -> Result<(), AuthenticatorError> {
    let mut buf = vec![0u8; MAX_RADIUS_PACKET];
    loop {
        let (len, from) = socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| AuthenticatorError::transport("radius", e))?;
        if from != server {
            warn!(source = %from, "Dropping RADIUS datagram from unexpected source");
            continue;
        }
        if inbound.send(Inbound::Radius(buf[..len].to_vec())).await.is_err() {
            return Ok(());
        }
    }
}

async fn radius_writer(
    socket: Arc<UdpSocket>,
    server: SocketAddr,
    mut outbound: mpsc::Receiver<Vec<u8>>,
) -> Result<(), AuthenticatorError> {
    while let Some(packet) = outbound.recv().await {
        socket
            .send_to(&packet, server)
            .await
            .map_err(|e| AuthenticatorError::transport("radius", e))?;
    }
    Ok(())
}
