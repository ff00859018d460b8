//! Encodes turn events as data stream protocol lines.
//!
//! `0:"text"\n` carries advisor speech, `2:[{id,type,data}]\n` carries one
//! structured item and `3:"message"\n` reports a fatal error after the
//! response has started. Lifecycle events are not sent to the client.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

use wayfarer_core::event::{DataItem, TurnEvent};

/// One line of the response stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Data(DataItem),
    Error(String),
}

impl Frame {
    /// The client-visible frame for an event, if it has one.
    pub fn from_event(event: TurnEvent) -> Option<Self> {
        match event {
            TurnEvent::TextDelta { text, .. } if !text.is_empty() => Some(Self::Text(text)),
            TurnEvent::Data(item) => Some(Self::Data(item)),
            TurnEvent::TurnFailed { error } => Some(Self::Error(error)),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Text(text) => format!("0:{}\n", Value::String(text.clone())),
            Self::Data(item) => format!(
                "2:{}\n",
                json!([{
                    "id": item.id.to_string(),
                    "type": item.kind.as_str(),
                    "data": item.data,
                }])
            ),
            Self::Error(message) => format!("3:{}\n", Value::String(message.clone())),
        }
    }
}

/// Response body stream for one turn, in publication order.
pub fn frame_stream(rx: UnboundedReceiver<TurnEvent>) -> impl Stream<Item = Bytes> + Send {
    UnboundedReceiverStream::new(rx)
        .filter_map(|event| async move { Frame::from_event(event) })
        .map(|frame| Bytes::from(frame.encode()))
}
