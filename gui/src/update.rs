use std::sync::mpsc::{channel, Receiver, Sender};

use model::{AssetNode, LoadError, LoadRequest};
use winit::event_loop::EventLoopProxy;

/// An update produced outside of the render loop.
pub enum Update {
    /// An asset load request finished.
    Loaded(LoadRequest, Result<AssetNode, LoadError>),
}

/// An updater allowing to wake up the render loop with updates from other threads.
#[derive(Clone)]
pub struct Updater {
    sender: Sender<Update>,
    event_loop_proxy: Option<EventLoopProxy<()>>,
}

impl Updater {
    /// Creates a new updater receiver pair from an event loop proxy.
    pub fn from_event_loop_proxy(event_loop_proxy: EventLoopProxy<()>) -> (Self, Receiver<Update>) {
        let (sender, receiver) = channel();

        (
            Self {
                sender,
                event_loop_proxy: Some(event_loop_proxy),
            },
            receiver,
        )
    }

    /// Creates a new updater receiver pair without waking up an event loop.
    #[must_use]
    pub fn detached() -> (Self, Receiver<Update>) {
        let (sender, receiver) = channel();

        (
            Self {
                sender,
                event_loop_proxy: None,
            },
            receiver,
        )
    }

    /// Sends an update and wakes up the event loop.
    pub fn send_update(&self, update: Update) {
        let _ = self.sender.send(update);
        if let Some(event_loop_proxy) = &self.event_loop_proxy {
            let _ = event_loop_proxy.send_event(());
        }
    }
}
