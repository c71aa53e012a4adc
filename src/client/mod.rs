//! Match client: the other end of the match protocol
//!
//! [`MatchClient::start`] drives a [`Transport`] in a background task and
//! reports everything through a [`ClientEvent`] channel. The pieces it is built
//! from ([`ClientProtocol`], [`ClientState`], [`PassDisplay`]) are usable on
//! their own by a UI that owns its own socket.

pub mod pass;
pub mod protocol;
pub mod state;
pub mod transport;

pub use pass::{ActControl, ControlState, PassDisplay, ResultsLatch};
pub use protocol::{ClientPhase, ClientProtocol, Step};
pub use state::ClientState;
pub use transport::{Transport, WsTransport};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::game::{RecapView, Seat};
use crate::ws::protocol::{encode, ClientMsg, Envelope, ProtocolError};

/// Capacity of the event channel handed to the caller
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("transport send failed: {0}")]
    TransportSend(String),

    #[error("transport receive failed: {0}")]
    TransportReceive(String),

    #[error("server broke the protocol: {0}")]
    ProtocolViolation(&'static str),

    #[error("invalid state payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("client is not connected")]
    NotConnected,
}

/// Everything presentation needs to hear about, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// The transport is open
    Connected,
    /// Seated, the opponent has not arrived yet
    WaitingForOpponent,
    /// The opponent arrived and our deck is on its way
    BothPlayersConnected,
    /// A state push, replay or live
    State(ClientState),
    /// The round that just resolved
    RoundRecap(RecapView),
    /// First state carrying a winner; fires once per match
    Results { winner: Seat },
    /// The server rejected something or ended the session
    ServerError { code: String, message: String },
    /// The opponent left; the match is over
    OpponentDisconnected,
    /// The opponent used an emote
    OpponentEmote(u32),
    /// Always the last event
    Disconnected { reason: Option<String> },
}

enum Command {
    Send(ClientMsg),
    Exit,
}

/// Handle to a running match connection
pub struct MatchClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl MatchClient {
    /// Start the transport loop over an open transport.
    ///
    /// The deck code is sent as soon as the server reports both players.
    #[must_use = "the event receiver must be used to receive events"]
    pub fn start(
        transport: impl Transport,
        deck_code: impl Into<String>,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let protocol = ClientProtocol::new(deck_code);
        let task = tokio::spawn(transport_loop(transport, protocol, cmd_rx, event_tx));

        (Self { cmd_tx, task }, event_rx)
    }

    /// Redraw the marked cards of the opening hand
    pub fn mulligan(&self, choices: Vec<bool>) -> Result<(), ClientError> {
        self.send(ClientMsg::Mulligan(choices))
    }

    pub fn play_card(&self, card_num: usize, version_no: u64) -> Result<(), ClientError> {
        self.send(ClientMsg::PlayCard {
            card_num,
            version_no,
        })
    }

    pub fn pass_turn(&self, version_no: u64) -> Result<(), ClientError> {
        self.send(ClientMsg::PassTurn { version_no })
    }

    pub fn emote(&self, emote: u32) -> Result<(), ClientError> {
        self.send(ClientMsg::Emote(emote))
    }

    /// Leave the match and close the connection
    pub fn exit(&self) -> Result<(), ClientError> {
        self.cmd_tx
            .send(Command::Exit)
            .map_err(|_| ClientError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        !self.task.is_finished()
    }

    fn send(&self, msg: ClientMsg) -> Result<(), ClientError> {
        self.cmd_tx
            .send(Command::Send(msg))
            .map_err(|_| ClientError::NotConnected)
    }
}

impl Drop for MatchClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Background loop multiplexing commands and inbound frames.
///
/// Exits on exit, on transport close or error, on a protocol violation by the
/// server, or when the client handle is dropped.
async fn transport_loop(
    mut transport: impl Transport,
    mut protocol: ClientProtocol,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<ClientEvent>,
) {
    emit(&event_tx, protocol.on_open()).await;

    let reason = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Send(msg)) => {
                    if !protocol.can_send(&msg) {
                        warn!(kind = msg.kind(), phase = ?protocol.phase(), "Dropping move outside a match");
                        continue;
                    }
                    if let Err(e) = write(&mut transport, &msg).await {
                        break Some(e.to_string());
                    }
                }
                Some(Command::Exit) => {
                    if let Err(e) = write(&mut transport, &ClientMsg::ExitMatch).await {
                        debug!(error = %e, "Exit message not delivered");
                    }
                    let _ = transport.close().await;
                    break Some("left match".to_string());
                }
                None => {
                    debug!("Command channel closed, shutting down transport loop");
                    let _ = transport.close().await;
                    break Some("client shut down".to_string());
                }
            },

            incoming = transport.recv() => match incoming {
                Some(Ok(text)) => match protocol.on_message(&text) {
                    Ok(step) => {
                        let mut failed = None;
                        for msg in &step.outbound {
                            if let Err(e) = write(&mut transport, msg).await {
                                failed = Some(e.to_string());
                                break;
                            }
                            if matches!(msg, ClientMsg::Init(_)) {
                                protocol.init_sent();
                            }
                        }
                        for event in step.events {
                            emit(&event_tx, event).await;
                        }
                        if failed.is_some() {
                            break failed;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Closing connection");
                        let _ = transport.close().await;
                        break Some(e.to_string());
                    }
                },
                Some(Err(e)) => {
                    error!(error = %e, "Transport receive error");
                    break Some(e.to_string());
                }
                None => {
                    debug!("Transport closed by server");
                    break None;
                }
            },
        }
    };

    // Disconnected is always last, so it is never dropped
    emit(&event_tx, protocol.on_close(reason)).await;
}

async fn write(transport: &mut impl Transport, msg: &ClientMsg) -> Result<(), ClientError> {
    let json = encode(msg)?;
    transport.send(json).await.map_err(|e| {
        error!(error = %e, "Transport send error");
        e
    })
}

async fn emit(event_tx: &mpsc::Sender<ClientEvent>, event: ClientEvent) {
    if event_tx.send(event).await.is_err() {
        debug!("Event channel closed, receiver dropped");
    }
}
