//! Sequential, non-reentrant delivery of listener callbacks.
//!
//! A [`SerializingExecutor`] owns one listener on a dedicated Tokio task and
//! applies queued callbacks to it in FIFO order. Two callbacks for the same
//! listener never overlap, and a callback queued with
//! [`SerializingExecutor::execute_final`] runs only after every earlier one
//! has returned. Nothing runs after the final callback.

use tokio::{runtime::Handle, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;

/// A callback applied to the owned listener.
pub type Callback<L> = Box<dyn FnOnce(&mut L) -> Result<()> + Send>;

enum Job<L: ?Sized> {
    Run(Callback<L>),
    Final(Callback<L>),
}

/// Cloneable handle to a serialized callback queue.
pub struct SerializingExecutor<L: ?Sized> {
    tx: mpsc::UnboundedSender<Job<L>>,
    done: CancellationToken,
}

impl<L: ?Sized> Clone for SerializingExecutor<L> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            done: self.done.clone(),
        }
    }
}

impl<L> SerializingExecutor<L>
where
    L: ?Sized + Send + 'static,
{
    /// Spawn the delivery task for `listener` on `runtime`.
    ///
    /// # Examples
    ///
    /// ```
    /// use callframe::{call::ClientCallListener, dispatch::SerializingExecutor};
    ///
    /// struct Quiet;
    /// impl ClientCallListener<u8> for Quiet {}
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let listener: Box<dyn ClientCallListener<u8>> = Box::new(Quiet);
    /// let executor = SerializingExecutor::spawn(&tokio::runtime::Handle::current(), listener);
    /// executor.execute(|listener| listener.on_message(1));
    /// executor.execute_final(|listener| listener.on_ready());
    /// executor.closed().await;
    /// # }
    /// ```
    pub fn spawn(runtime: &Handle, listener: Box<L>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let done = CancellationToken::new();
        runtime.spawn(run(listener, rx, done.clone()));
        Self { tx, done }
    }

    /// Queue `callback`. Returns `false` if the executor has already shut down.
    pub fn execute<F>(&self, callback: F) -> bool
    where
        F: FnOnce(&mut L) -> Result<()> + Send + 'static,
    {
        self.tx.send(Job::Run(Box::new(callback))).is_ok()
    }

    /// Queue the terminal `callback`; the executor stops after running it.
    ///
    /// Callbacks queued afterwards are discarded without running.
    pub fn execute_final<F>(&self, callback: F) -> bool
    where
        F: FnOnce(&mut L) -> Result<()> + Send + 'static,
    {
        self.tx.send(Job::Final(Box::new(callback))).is_ok()
    }
}

impl<L: ?Sized> SerializingExecutor<L> {
    /// Returns `true` once the delivery task has stopped accepting callbacks.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }

    /// Wait until the delivery task has finished.
    pub async fn closed(&self) { self.done.cancelled().await; }
}

async fn run<L>(mut listener: Box<L>, mut rx: mpsc::UnboundedReceiver<Job<L>>, done: CancellationToken)
where
    L: ?Sized + Send,
{
    let _finished = done.drop_guard();
    while let Some(job) = rx.recv().await {
        let (callback, last) = match job {
            Job::Run(callback) => (callback, false),
            Job::Final(callback) => (callback, true),
        };
        if let Err(error) = callback(&mut *listener) {
            warn!(%error, "listener rejected callback");
        }
        if last {
            break;
        }
    }
    rx.close();
    let mut discarded = 0_usize;
    while rx.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        debug!(discarded, "callbacks discarded after final delivery");
    }
}
