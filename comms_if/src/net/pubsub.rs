//! # Publish/Subscribe Transports
//!
//! Components which stream data between each other do so through the [`Publisher`] and
//! [`Subscriber`] traits. Two implementations of each are provided: ZMQ sockets carrying JSON
//! payloads for use between processes, and `std::sync::mpsc` channels for use within a process.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    marker::PhantomData,
    sync::mpsc::{Receiver, RecvTimeoutError, SendError, Sender},
    time::Duration,
};

use serde::{de::DeserializeOwned, Serialize};

use super::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Receiving end of a stream of messages.
pub trait Subscriber<T> {
    /// Receive the next message.
    ///
    /// Blocks for at most the subscriber's receive timeout, returning `Ok(None)` if nothing
    /// arrived in that time.
    fn recv(&mut self) -> Result<Option<T>, SubscriberError>;
}

/// Sending end of a stream of messages.
pub trait Publisher<T> {
    /// Publish a message under the given topic.
    fn publish(&mut self, topic: &str, msg: &T) -> Result<(), PublisherError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A ZMQ `SUB` socket which deserializes JSON messages published under one topic.
pub struct ZmqSubscriber<T> {
    socket: MonitoredSocket,
    _msg: PhantomData<fn() -> T>,
}

/// A ZMQ `PUB` socket which serializes messages to JSON.
pub struct ZmqPublisher {
    socket: MonitoredSocket,
}

/// In-process subscriber wrapping a channel receiver.
pub struct ChannelSubscriber<T> {
    receiver: Receiver<T>,
    timeout: Duration,
}

/// In-process publisher wrapping a channel sender. The topic is sent along with the message.
pub struct ChannelPublisher<T> {
    sender: Sender<(String, T)>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not recieve a message: {0}")]
    RecvError(zmq::Error),

    #[error("Recieved a message with no frames")]
    EmptyMessage,

    #[error("Could not deserialize the message: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The publishing end of the channel has been dropped")]
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the message: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the message: {0}")]
    SerializationError(serde_json::Error),

    #[error("The subscribing end of the channel has been dropped")]
    Disconnected,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SubscriberError {
    /// Returns true if no further messages can ever be received after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SubscriberError::Disconnected
                | SubscriberError::SocketError(_)
                | SubscriberError::RecvError(_)
        )
    }
}

impl<T> ZmqSubscriber<T> {
    /// Connect a new subscriber to the given endpoint.
    ///
    /// `recv_timeout_ms` bounds how long a call to `recv` blocks for. This function will not
    /// block until the publisher is present.
    pub fn new(
        ctx: &zmq::Context,
        endpoint: &str,
        topic: &str,
        recv_timeout_ms: i32,
    ) -> Result<Self, SubscriberError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: recv_timeout_ms,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, endpoint)
            .map_err(SubscriberError::SocketError)?;

        socket.set_subscribe(topic.as_bytes()).map_err(|e| {
            SubscriberError::SocketError(MonitoredSocketError::SubscribeError(topic.into(), e))
        })?;

        Ok(Self {
            socket,
            _msg: PhantomData,
        })
    }
}

impl<T> Subscriber<T> for ZmqSubscriber<T>
where
    T: DeserializeOwned,
{
    fn recv(&mut self) -> Result<Option<T>, SubscriberError> {
        let frames = match self.socket.recv_multipart(0) {
            Ok(f) => f,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(SubscriberError::RecvError(e)),
        };

        // Payload is the final frame, any before it are the topic
        let payload = frames.last().ok_or(SubscriberError::EmptyMessage)?;

        serde_json::from_slice(payload)
            .map(Some)
            .map_err(SubscriberError::DeserializeError)
    }
}

impl ZmqPublisher {
    /// Bind a new publisher to the given endpoint.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, PublisherError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, endpoint)
            .map_err(PublisherError::SocketError)?;

        Ok(Self { socket })
    }
}

impl<T> Publisher<T> for ZmqPublisher
where
    T: Serialize,
{
    fn publish(&mut self, topic: &str, msg: &T) -> Result<(), PublisherError> {
        let payload = serde_json::to_string(msg).map_err(PublisherError::SerializationError)?;

        self.socket
            .send_multipart(vec![topic.as_bytes(), payload.as_bytes()], 0)
            .map_err(PublisherError::SendError)
    }
}

impl<T> ChannelSubscriber<T> {
    pub fn new(receiver: Receiver<T>, timeout: Duration) -> Self {
        Self { receiver, timeout }
    }
}

impl<T> Subscriber<T> for ChannelSubscriber<T> {
    fn recv(&mut self) -> Result<Option<T>, SubscriberError> {
        match self.receiver.recv_timeout(self.timeout) {
            Ok(m) => Ok(Some(m)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SubscriberError::Disconnected),
        }
    }
}

impl<T> ChannelPublisher<T> {
    pub fn new(sender: Sender<(String, T)>) -> Self {
        Self { sender }
    }
}

impl<T> Publisher<T> for ChannelPublisher<T>
where
    T: Clone,
{
    fn publish(&mut self, topic: &str, msg: &T) -> Result<(), PublisherError> {
        self.sender
            .send((topic.to_string(), msg.clone()))
            .map_err(|_: SendError<_>| PublisherError::Disconnected)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_channel_subscriber_times_out() {
        let (tx, rx) = channel::<u32>();
        let mut sub = ChannelSubscriber::new(rx, Duration::from_millis(1));

        assert!(matches!(sub.recv(), Ok(None)));

        tx.send(5).unwrap();
        assert!(matches!(sub.recv(), Ok(Some(5))));

        drop(tx);
        let err = sub.recv().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_channel_publisher_sends_topic() {
        let (tx, rx) = channel();
        let mut publisher = ChannelPublisher::new(tx);

        publisher.publish("status", &3.5f32).unwrap();
        assert_eq!(rx.recv().unwrap(), ("status".to_string(), 3.5f32));

        drop(rx);
        assert!(matches!(
            publisher.publish("status", &1.0f32),
            Err(PublisherError::Disconnected)
        ));
    }

    #[test]
    fn test_zmq_inproc_pubsub() {
        let ctx = zmq::Context::new();
        let mut publisher = ZmqPublisher::new(&ctx, "inproc://test_pubsub").unwrap();
        let mut sub: ZmqSubscriber<Vec<u32>> =
            ZmqSubscriber::new(&ctx, "inproc://test_pubsub", "numbers", 10).unwrap();

        // Slow joiner, keep publishing until the subscription has propagated
        let mut received = None;
        for _ in 0..200 {
            publisher.publish("numbers", &vec![1u32, 2, 3]).unwrap();
            publisher.publish("other", &vec![9u32]).unwrap();
            if let Some(m) = sub.recv().unwrap() {
                received = Some(m);
                break;
            }
        }

        assert_eq!(received, Some(vec![1, 2, 3]));
    }
}
