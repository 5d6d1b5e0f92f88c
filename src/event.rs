use crate::connection::{ConnectionHandle, ConnectionInfo, ID};
use crate::error::{Error, HandlerError};
use crate::handler::Handler;
use crate::message::Message;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

// Base enum, used as the structure to represent every single event within
// the websockets server, offering the end-user a practical way of spawning a server
// and handling connections
pub enum Event {
    NewClient(ID, ConnectionHandle),
    NewMessage(ID, Message),
    Disconnect(ID),
    Error(ID, Error),
}

// This struct will be used for implementing Stream trait. Thus, the end-user
// doesn't need to interact with the mpsc tokio channel directly
pub struct EventStream {
    receiver: UnboundedReceiverStream<Event>,
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver).poll_next(cx)
    }
}

/// [`Handler`] turning every callback into an [`Event`], for applications that prefer consuming
/// a single stream over implementing callbacks.
pub struct EventHandler {
    sender: UnboundedSender<Event>,
}

impl EventHandler {
    pub fn new() -> (Self, EventStream) {
        let (sender, receiver) = unbounded_channel();
        let stream = EventStream {
            receiver: UnboundedReceiverStream::new(receiver),
        };
        (Self { sender }, stream)
    }

    fn emit(&self, event: Event) -> Result<(), HandlerError> {
        self.sender
            .send(event)
            .map_err(|_| "event stream was dropped".into())
    }
}

impl Handler for EventHandler {
    // Nobody would ever hear about a connection accepted after the stream is gone
    fn connected(&self, _info: &ConnectionInfo) -> bool {
        !self.sender.is_closed()
    }

    fn ready(&self, connection: &ConnectionHandle) -> Result<(), HandlerError> {
        self.emit(Event::NewClient(connection.id(), connection.clone()))
    }

    fn received(&self, connection: &ConnectionHandle, message: Message) -> Result<(), HandlerError> {
        self.emit(Event::NewMessage(connection.id(), message))
    }

    fn failed(&self, connection: &ConnectionHandle, error: Error) {
        let _ = self.emit(Event::Error(connection.id(), error));
    }

    fn disconnected(&self, connection: &ConnectionHandle) {
        let _ = self.emit(Event::Disconnect(connection.id()));
    }
}
