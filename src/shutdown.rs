use tokio::sync::broadcast;
use tracing::debug;

/// A signal telling every component holding resources that the process is
/// going down and cleanup must run now.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// Broadcasts shutdown signals to any number of receivers.
#[derive(Clone)]
pub struct ShutdownController {
    sender: broadcast::Sender<ShutdownSignal>,
}

impl ShutdownController {
    pub fn new() -> (Self, ShutdownReceiver) {
        let (sender, receiver) = broadcast::channel(8);
        (Self { sender }, ShutdownReceiver { receiver })
    }

    pub fn subscribe(&self) -> ShutdownReceiver {
        ShutdownReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn signal_shutdown(&self) {
        debug!(
            "broadcasting shutdown to {} receivers",
            self.sender.receiver_count()
        );
        let _ = self.sender.send(ShutdownSignal);
    }
}

/// Waits for a shutdown signal.
pub struct ShutdownReceiver {
    receiver: broadcast::Receiver<ShutdownSignal>,
}

impl ShutdownReceiver {
    /// Suspend until shutdown is signalled. A closed channel counts as
    /// shutdown.
    pub async fn wait_for_shutdown(&mut self) -> ShutdownSignal {
        match self.receiver.recv().await {
            Ok(signal) => signal,
            Err(_) => ShutdownSignal,
        }
    }
}
