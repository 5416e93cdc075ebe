//! Relay loop between the radio packet queue and the host link

use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tokio_util::codec::{Framed, LinesCodecError};

use espnow_bridge_core::{Consumer, MacAddress, PacketQueue, Statistics, DEFAULT_QUEUE_SLOTS};
use espnow_bridge_radio::{PeerRegistry, RadioDriver, RelayReceiver};

use crate::codec::{HostLine, HostLineCodec};
use crate::command::{Command, CommandError, ErrorCode, Reply};
use crate::framing::encode_rx_frame;
use crate::{BridgeConfig, BridgeError};

pub const READY_BANNER: &str = "READY";

/// Engine with the default four-slot packet queue.
pub type Bridge = BridgeEngine<DEFAULT_QUEUE_SLOTS>;

pub struct BridgeEngine<const N: usize> {
    radio: Arc<dyn RadioDriver>,
    config: BridgeConfig,
    stats: Arc<Statistics>,
    peers: PeerRegistry,
    consumer: Consumer<N>,
    wake: Arc<Notify>,
    // Handed to the radio on start
    receiver: Option<RelayReceiver<N>>,
}

enum LinkEvent {
    Wake,
    Line(Option<Result<HostLine, LinesCodecError>>),
}

impl<const N: usize> BridgeEngine<N> {
    pub fn new(radio: Arc<dyn RadioDriver>, config: BridgeConfig) -> Self {
        let stats = Arc::new(Statistics::new());
        let wake = Arc::new(Notify::new());
        let (producer, consumer) = PacketQueue::<N>::new().split();
        let receiver = RelayReceiver::new(producer, Arc::clone(&stats), Arc::clone(&wake));

        Self {
            radio,
            config,
            stats,
            peers: PeerRegistry::new(),
            consumer,
            wake,
            receiver: Some(receiver),
        }
    }

    pub fn stats(&self) -> Arc<Statistics> {
        Arc::clone(&self.stats)
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    /// Initializes the radio and installs the receive handler.
    pub async fn start(&mut self) -> Result<(), BridgeError> {
        let receiver = self.receiver.take().ok_or(BridgeError::AlreadyStarted)?;
        self.radio
            .init(Box::new(receiver))
            .await
            .map_err(BridgeError::RadioInit)
    }

    /// Runs the bridge over `io` until the host link closes.
    ///
    /// A radio init failure is reported once on the link and returned; the
    /// loop never starts in that case.
    pub async fn run<T>(mut self, io: T) -> Result<(), BridgeError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut link = Framed::new(io, HostLineCodec::new(self.config.max_line_length));

        if let Err(e) = self.start().await {
            error!("{}", e);
            link.send(ErrorCode::EspNowInitFail.to_string()).await?;
            return Err(e);
        }
        link.send(READY_BANNER).await?;
        info!("Bridge ready (queue capacity {})", self.consumer.capacity());

        let wake = Arc::clone(&self.wake);
        loop {
            self.relay_pending(&mut link).await?;

            let event = tokio::select! {
                _ = wake.notified() => LinkEvent::Wake,
                line = link.next() => LinkEvent::Line(line),
            };

            match event {
                LinkEvent::Wake => {}
                LinkEvent::Line(Some(Ok(line))) => {
                    let reply = self.handle_host_line(line).await;
                    link.send(reply.to_string()).await?;
                }
                LinkEvent::Line(Some(Err(e))) => return Err(e.into()),
                LinkEvent::Line(None) => {
                    info!("Host link closed");
                    return Ok(());
                }
            }
        }
    }

    async fn relay_pending<T>(
        &mut self,
        link: &mut Framed<T, HostLineCodec>,
    ) -> Result<(), BridgeError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        while let Some(packet) = self.consumer.dequeue() {
            link.send(encode_rx_frame(&packet)).await?;
            self.stats.record_sent();
            trace!("Relayed {} bytes from {}", packet.len(), packet.source());
        }
        Ok(())
    }

    async fn handle_host_line(&mut self, line: HostLine) -> Reply {
        match line {
            HostLine::Line(line) => self.handle_line(line.trim()).await,
            HostLine::Invalid => {
                debug!("Rejected host line that is not UTF-8");
                Reply::Error(ErrorCode::UnknownCommand)
            }
            HostLine::Overlong { transmit } => {
                warn!("Discarded host line longer than {} bytes", self.config.max_line_length);
                // Any payload this long is past the radio MTU
                if transmit {
                    Reply::Error(ErrorCode::SendFail)
                } else {
                    Reply::Error(ErrorCode::UnknownCommand)
                }
            }
        }
    }

    /// Parses and executes one trimmed host line.
    pub async fn handle_line(&mut self, line: &str) -> Reply {
        match Command::parse(line) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                debug!("Rejected host line {:?}: {}", line, e);
                e.into()
            }
        }
    }

    pub async fn dispatch(&mut self, command: Command) -> Reply {
        match command {
            Command::Ping => Reply::Pong,
            Command::Stats => Reply::Stats(self.stats.snapshot()),
            Command::Transmit { peer, payload } => match self.transmit(peer, &payload).await {
                Ok(()) => Reply::Ok,
                Err(e) => {
                    warn!("Send to {} failed: {}", peer, e);
                    e.into()
                }
            },
        }
    }

    async fn transmit(&mut self, peer: MacAddress, payload: &[u8]) -> Result<(), CommandError> {
        self.peers
            .register(peer, self.radio.as_ref())
            .await
            .map_err(CommandError::SendFail)?;

        self.radio
            .send(peer, payload)
            .await
            .map_err(CommandError::SendFail)?;

        debug!("Sent {} bytes to {}", payload.len(), peer);
        Ok(())
    }
}
