use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use aligna_types::events::ClientCommand;

/// Debounced typing signals towards one receiver.
///
/// Every input change sends `typing`; once input has been idle for
/// `idle`, a single `stopTyping` follows. Dropping the signaler ends the
/// timer, and an open typing period is closed with a final `stopTyping`.
/// All commands are sent from the debounce task, so that final stop is
/// always the last one.
pub struct TypingSignaler {
    input_tx: Option<mpsc::UnboundedSender<()>>,
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl TypingSignaler {
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        receiver_id: impl Into<String>,
        outbound: mpsc::UnboundedSender<ClientCommand>,
        idle: Duration,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_debounce(
            input_rx,
            outbound,
            receiver_id.into(),
            idle,
            active.clone(),
        ));

        Self {
            input_tx: Some(input_tx),
            active,
            task: Some(task),
        }
    }

    /// Record one change of the input text.
    pub fn input_changed(&self) {
        if let Some(input_tx) = &self.input_tx {
            let _ = input_tx.send(());
        }
    }

    /// Whether a typing period is open (a `stopTyping` is still owed).
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop the debounce and wait until its last command is queued.
    pub async fn finish(mut self) {
        self.input_tx.take();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TypingSignaler {
    fn drop(&mut self) {
        // Closing the input channel ends the task; it owes the final stop.
        self.input_tx.take();
    }
}

async fn run_debounce(
    mut input_rx: mpsc::UnboundedReceiver<()>,
    outbound: mpsc::UnboundedSender<ClientCommand>,
    receiver_id: String,
    idle: Duration,
    active: Arc<AtomicBool>,
) {
    let typing = ClientCommand::Typing {
        receiver_id: receiver_id.clone(),
    };
    let stop = ClientCommand::StopTyping { receiver_id };

    // Wait for the first keystroke of a typing period
    while input_rx.recv().await.is_some() {
        active.store(true, Ordering::Release);
        if outbound.send(typing.clone()).is_err() {
            return;
        }

        // Each keystroke re-sends typing and restarts the idle timer
        loop {
            tokio::select! {
                next = input_rx.recv() => {
                    if next.is_none() {
                        break;
                    }
                    if outbound.send(typing.clone()).is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(idle) => {
                    trace!("Typing idle, sending stopTyping");
                    break;
                }
            }
        }

        if active.swap(false, Ordering::AcqRel) && outbound.send(stop.clone()).is_err() {
            return;
        }
    }
}
