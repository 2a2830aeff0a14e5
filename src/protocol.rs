//! The chat protocol seam.
//!
//! The room view never talks to a server directly: it consumes
//! [`ProtocolEvent`]s from an event channel and pushes [`ProtocolCommand`]s
//! into a command channel. A client implementation services the command
//! channel on its own task; the UI task stays synchronous.
//!
//! Network I/O is out of scope for this crate, so the shipped
//! implementation is [`LocalRoom`]: an offline room that echoes sends back
//! as messages with locally generated ids and answers history requests
//! with an empty page. A networked client implements the same trait.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::store::{Message, MessageId};

/// A message as it crosses the protocol boundary.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WireMessage {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub nick: String,
    pub content: String,
}

impl WireMessage {
    pub fn to_message(&self) -> Message {
        let timestamp: DateTime<Utc> = Utc
            .timestamp_opt(self.timestamp, 0)
            .single()
            .unwrap_or_default();
        Message::new(
            self.id.as_str(),
            self.parent_id.as_deref().map(MessageId::from),
            timestamp,
            self.nick.as_str(),
            self.content.as_str(),
        )
    }
}

/// A connected session, as shown in the nick list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub nick: String,
    #[serde(default)]
    pub is_bot: bool,
}

/// Events delivered from the client task to the UI task.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// The client connected; the session is our own.
    Connected(SessionInfo),
    /// A batch of messages, e.g. the room history on join.
    Snapshot(Vec<WireMessage>),
    /// A newly sent message.
    Send(WireMessage),
    /// A message edit; replaces the message with the same id.
    Edit(WireMessage),
    Join(SessionInfo),
    Part(SessionInfo),
    Nick {
        session_id: String,
        from: String,
        to: String,
    },
    /// Reply to a history request. Empty means the top of the room's
    /// history was reached.
    LogReply(Vec<WireMessage>),
    Disconnect {
        reason: String,
    },
}

/// Commands from the UI task to the client task.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolCommand {
    Send {
        content: String,
        parent_id: Option<MessageId>,
    },
    SetNick(String),
    RequestLog {
        before: Option<MessageId>,
        amount: usize,
    },
    Close,
}

/// A chat room client: services commands, produces events.
#[async_trait]
pub trait ProtocolClient: Send + 'static {
    async fn run(
        self,
        commands: mpsc::Receiver<ProtocolCommand>,
        events: mpsc::Sender<ProtocolEvent>,
    );
}

/// Spawn a client on its own task and hand back the command channel.
pub fn spawn_client<C: ProtocolClient>(
    client: C,
    events: mpsc::Sender<ProtocolEvent>,
) -> mpsc::Sender<ProtocolCommand> {
    let (command_tx, command_rx) = mpsc::channel(64);
    tokio::spawn(client.run(command_rx, events));
    command_tx
}

/// An offline, in-process room. Sends come straight back as messages; the
/// history above the session start is empty.
#[derive(Debug)]
pub struct LocalRoom {
    nick: String,
    counter: u64,
}

const LOCAL_SESSION_ID: &str = "local-session";
/// Width of generated ids; base-36 digits, so ids sort by send order.
const ID_WIDTH: usize = 13;

impl LocalRoom {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            counter: 0,
        }
    }

    fn session(&self) -> SessionInfo {
        SessionInfo {
            id: LOCAL_SESSION_ID.to_string(),
            nick: self.nick.clone(),
            is_bot: false,
        }
    }

    fn next_id(&mut self) -> String {
        self.counter += 1;
        encode_base36(self.counter, ID_WIDTH)
    }
}

#[async_trait]
impl ProtocolClient for LocalRoom {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ProtocolCommand>,
        events: mpsc::Sender<ProtocolEvent>,
    ) {
        if events
            .send(ProtocolEvent::Connected(self.session()))
            .await
            .is_err()
        {
            return;
        }

        while let Some(command) = commands.recv().await {
            debug!(?command, "local room command");
            let event = match command {
                ProtocolCommand::Send { content, parent_id } => {
                    let message = WireMessage {
                        id: self.next_id(),
                        parent_id: parent_id.map(|id| id.as_str().to_string()),
                        timestamp: Utc::now().timestamp(),
                        nick: self.nick.clone(),
                        content,
                    };
                    ProtocolEvent::Send(message)
                }
                ProtocolCommand::SetNick(to) => {
                    let from = std::mem::replace(&mut self.nick, to.clone());
                    ProtocolEvent::Nick {
                        session_id: LOCAL_SESSION_ID.to_string(),
                        from,
                        to,
                    }
                }
                ProtocolCommand::RequestLog { .. } => ProtocolEvent::LogReply(Vec::new()),
                ProtocolCommand::Close => break,
            };

            if events.send(event).await.is_err() {
                break;
            }
        }
    }
}

/// Zero-padded base-36 rendering, the id alphabet of the wire format.
fn encode_base36(mut value: u64, width: usize) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
        if value == 0 {
            break;
        }
    }
    while out.len() < width {
        out.push(b'0');
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_ids_sort_by_send_order() {
        let earlier = encode_base36(41, ID_WIDTH);
        let later = encode_base36(42, ID_WIDTH);
        assert_eq!(ID_WIDTH, earlier.len());
        assert!(earlier < later);
        assert_eq!("0000000000015", earlier);
    }

    #[test]
    fn wire_messages_parse_from_protocol_json() {
        let json = r#"{
            "id": "0000000000015",
            "parent_id": "000000000000z",
            "timestamp": 1557235506,
            "nick": "garm",
            "content": "hello\nworld"
        }"#;
        let message: WireMessage = serde_json::from_str(json).unwrap();
        assert_eq!("garm", message.nick);
        assert_eq!(Some("000000000000z".to_string()), message.parent_id);

        // parent_id is optional on the wire.
        let message: WireMessage = serde_json::from_str(
            r#"{"id": "1", "timestamp": 0, "nick": "n", "content": "c"}"#,
        )
        .unwrap();
        assert_eq!(None, message.parent_id);
    }

    #[test]
    fn wire_messages_convert_to_store_messages() {
        let wire = WireMessage {
            id: "m1".to_string(),
            parent_id: Some("m0".to_string()),
            timestamp: 1557235506,
            nick: "garm".to_string(),
            content: "hi".to_string(),
        };
        let message = wire.to_message();
        assert_eq!(MessageId::from("m1"), message.id);
        assert_eq!(Some(MessageId::from("m0")), message.parent_id);
        assert_eq!("hi", message.content);
    }

    #[tokio::test]
    async fn local_room_echoes_sends_and_answers_logs() {
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let commands = spawn_client(LocalRoom::new("self"), event_tx);

        let connected = event_rx.recv().await.unwrap();
        assert!(matches!(connected, ProtocolEvent::Connected(_)));

        commands
            .send(ProtocolCommand::Send {
                content: "hello".to_string(),
                parent_id: None,
            })
            .await
            .unwrap();
        match event_rx.recv().await.unwrap() {
            ProtocolEvent::Send(message) => {
                assert_eq!("hello", message.content);
                assert_eq!("self", message.nick);
            }
            other => panic!("unexpected event {other:?}"),
        }

        commands
            .send(ProtocolCommand::RequestLog {
                before: None,
                amount: 50,
            })
            .await
            .unwrap();
        match event_rx.recv().await.unwrap() {
            ProtocolEvent::LogReply(messages) => assert!(messages.is_empty()),
            other => panic!("unexpected event {other:?}"),
        }

        commands.send(ProtocolCommand::Close).await.unwrap();
    }
}
