use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::error::BusError;
use crate::message::Message;
use crate::traits::{EventPublisher, EventSubscriber};
use crate::transport::Transport;

/// Bound on establishing a TCP connection to a broker socket.
///
/// `zeromq` retries refused connections indefinitely, so an unreachable
/// broker would otherwise hang the caller.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// PUB socket connected to a broker frontend.
///
/// Messages go out as two frames: the topic (for SUB prefix filtering) and
/// the MessagePack-encoded [`Message`] envelope.
pub struct ZmqPublisher {
    transport: Transport,
    socket: Mutex<PubSocket>,
}

impl ZmqPublisher {
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = PubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting PUB socket to broker frontend");
        connect_with_timeout(&endpoint, socket.connect(&endpoint)).await?;
        Ok(Self {
            transport: transport.clone(),
            socket: Mutex::new(socket),
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

#[async_trait]
impl EventPublisher for ZmqPublisher {
    async fn publish(&self, message: Message) -> Result<(), BusError> {
        let topic = message.topic.clone();
        let envelope_bytes = message.to_bytes()?;

        let mut zmq_msg = ZmqMessage::from(topic.as_str());
        zmq_msg.push_back(envelope_bytes.into());

        let mut socket = self.socket.lock().await;
        socket.send(zmq_msg).await?;

        debug!(topic = %topic, endpoint = %self.transport, "published message");
        Ok(())
    }
}

/// SUB socket connected to a broker backend.
pub struct ZmqSubscriber {
    socket: Mutex<SubSocket>,
}

impl ZmqSubscriber {
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, BusError> {
        let mut socket = SubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting SUB socket to broker backend");
        connect_with_timeout(&endpoint, socket.connect(&endpoint)).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventSubscriber for ZmqSubscriber {
    async fn subscribe(&self, topic_prefix: &str) -> Result<(), BusError> {
        let mut socket = self.socket.lock().await;
        socket.subscribe(topic_prefix).await?;
        info!(topic_prefix = %topic_prefix, "subscribed to topic prefix");
        Ok(())
    }

    /// Expects `[topic, envelope]`; a single frame is read as the envelope.
    async fn recv(&self) -> Result<Message, BusError> {
        let mut socket = self.socket.lock().await;
        let zmq_msg = socket.recv().await?;

        let frames: Vec<_> = zmq_msg.iter().collect();
        let envelope: &[u8] = match frames.as_slice() {
            [_, envelope, ..] => envelope.as_ref(),
            [single] => single.as_ref(),
            [] => return Err(BusError::Transport("empty ZMQ message".into())),
        };
        let message = Message::from_bytes(envelope)?;
        debug!(topic = %message.topic, "received message");
        Ok(message)
    }
}

async fn connect_with_timeout<F>(endpoint: &str, connect: F) -> Result<(), BusError>
where
    F: std::future::Future<Output = Result<(), zeromq::ZmqError>>,
{
    match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
        Ok(result) => result.map_err(BusError::from),
        Err(_) => Err(BusError::Timeout {
            endpoint: endpoint.to_string(),
            timeout: CONNECT_TIMEOUT,
        }),
    }
}
