//! Debounced background writer for workspace snapshots.
//!
//! # Responsibility
//! - Coalesce bursts of saves into one write of the latest snapshot.
//! - Keep file I/O off the session thread.
//!
//! # Invariants
//! - Only the most recent pending snapshot is ever written.
//! - A write happens once no new snapshot arrived for the debounce window,
//!   on `flush`, or when the writer is dropped.
//! - Write failures never panic; they are logged and forwarded to the sink.

use crate::backend::{BackendError, FileStore};
use log::{debug, error};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Callback receiving background write failures.
pub type ErrorSink = Arc<dyn Fn(&BackendError) + Send + Sync>;

enum WriterMessage {
    Snapshot(String),
    Flush(Sender<()>),
}

/// Handle to the background save thread.
pub struct SaveWriter {
    sender: Option<Sender<WriterMessage>>,
    handle: Option<JoinHandle<()>>,
}

impl SaveWriter {
    /// Starts the writer thread for `path` in `files`.
    pub fn spawn(
        files: Arc<dyn FileStore>,
        path: String,
        debounce: Duration,
        on_error: ErrorSink,
    ) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("treehouse-save".to_string())
            .spawn(move || run(receiver, files, path, debounce, on_error))?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queues a snapshot; fire-and-forget.
    pub fn submit(&self, contents: String) {
        if let Some(sender) = &self.sender {
            if sender.send(WriterMessage::Snapshot(contents)).is_err() {
                error!("event=workspace_save module=workspace status=error error_code=writer_gone");
            }
        }
    }

    /// Blocks until every queued snapshot has been written.
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (ack_sender, ack_receiver) = mpsc::channel();
        if sender.send(WriterMessage::Flush(ack_sender)).is_ok() {
            let _ = ack_receiver.recv();
        }
    }
}

impl Drop for SaveWriter {
    fn drop(&mut self) {
        // Disconnecting makes the thread write what is pending and exit.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    receiver: Receiver<WriterMessage>,
    files: Arc<dyn FileStore>,
    path: String,
    debounce: Duration,
    on_error: ErrorSink,
) {
    let mut pending: Option<String> = None;
    loop {
        let message = if pending.is_some() {
            match receiver.recv_timeout(debounce) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match receiver.recv() {
                Ok(message) => Some(message),
                Err(_) => break,
            }
        };

        match message {
            Some(WriterMessage::Snapshot(contents)) => pending = Some(contents),
            Some(WriterMessage::Flush(ack)) => {
                write_pending(&mut pending, files.as_ref(), &path, &on_error);
                let _ = ack.send(());
            }
            None => write_pending(&mut pending, files.as_ref(), &path, &on_error),
        }
    }
    write_pending(&mut pending, files.as_ref(), &path, &on_error);
}

fn write_pending(
    pending: &mut Option<String>,
    files: &dyn FileStore,
    path: &str,
    on_error: &ErrorSink,
) {
    let Some(contents) = pending.take() else {
        return;
    };
    let started_at = Instant::now();
    match files.write_file(path, &contents) {
        Ok(()) => debug!(
            "event=workspace_save module=workspace status=ok bytes={} duration_ms={}",
            contents.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => {
            error!(
                "event=workspace_save module=workspace status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            on_error(&err);
        }
    }
}
