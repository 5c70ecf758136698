//! Change notification trigger points.
//!
//! The transport is out of scope: the VFS only promises that an event is
//! emitted after the backend mutation succeeded and before the dispatch
//! function returns. Callers plug a sink; a plain mpsc sink ships for
//! convenience.

use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FsEventKind {
    /// A path was created, deleted or renamed.
    Rename,
    /// File content was modified.
    Change,
}

impl FsEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FsEventKind::Rename => "rename",
            FsEventKind::Change => "change",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    /// The affected caller-visible path.
    pub path: String,
}

pub trait EventSink: Send + Sync {
    fn notify(&self, event: &FsEvent);
}

/// Sink that forwards events into an [`mpsc`] channel, dropping them once
/// the receiver is gone.
pub struct ChannelSink {
    tx: mpsc::Sender<FsEvent>,
}

impl ChannelSink {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<FsEvent>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl EventSink for ChannelSink {
    fn notify(&self, event: &FsEvent) {
        let _ = self.tx.send(event.clone());
    }
}

#[derive(Default)]
pub(crate) struct EventBus {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventBus {
    pub(crate) fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    pub(crate) fn emit(&self, kind: FsEventKind, path: &str) {
        let sinks = self.sinks.read();
        if sinks.is_empty() {
            return;
        }
        let event = FsEvent {
            kind,
            path: path.to_owned(),
        };
        for sink in sinks.iter() {
            sink.notify(&event);
        }
    }
}
