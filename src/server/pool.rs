//! Fixed set of worker threads fed through a bounded queue.

use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError,
        mpsc::{self, Receiver, SyncSender, TrySendError},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, error, warn};

/// An item the pool did not take, handed back to the caller.
#[derive(Debug)]
pub enum Rejected<T> {
    /// every worker is busy and the queue is at capacity
    Full(T),
    /// the pool is shutting down
    Closed(T),
}

impl<T> Rejected<T> {
    pub fn into_inner(self) -> T {
        match self {
            Rejected::Full(item) | Rejected::Closed(item) => item,
        }
    }
}

struct Worker {
    id: usize,
    thread: JoinHandle<()>,
}

impl Worker {
    fn spawn<T, F>(
        name: &str,
        id: usize,
        receiver: Arc<Mutex<Receiver<T>>>,
        handler: Arc<F>,
    ) -> io::Result<Self>
    where
        T: Send + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let thread = thread::Builder::new()
            .name(format!("{name}-{id}"))
            .spawn(move || {
                loop {
                    let next = receiver
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .recv();
                    let Ok(item) = next else {
                        debug!("Worker {id} exiting");
                        break;
                    };

                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (*handler)(item)))
                    {
                        error!("Worker {id} recovered from a panic: {}", panic_message(&*payload));
                    }
                }
            })?;

        Ok(Self { id, thread })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Runs `handler` on items submitted from other threads.
///
/// At most `size` items are processed at once and at most `queue_capacity`
/// wait for a worker; a capacity of zero means submissions only succeed
/// while a worker is idle.
pub struct WorkerPool<T: Send + 'static> {
    sender: Option<SyncSender<T>>,
    workers: Vec<Worker>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new<F>(name: &str, size: usize, queue_capacity: usize, handler: F) -> io::Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let handler = Arc::new(handler);

        let workers = (0..size.max(1))
            .map(|id| Worker::spawn(name, id, Arc::clone(&receiver), Arc::clone(&handler)))
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// queues `item` without waiting
    pub fn try_submit(&self, item: T) -> Result<(), Rejected<T>> {
        let Some(sender) = &self.sender else {
            return Err(Rejected::Closed(item));
        };
        sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(item) => Rejected::Full(item),
            TrySendError::Disconnected(item) => Rejected::Closed(item),
        })
    }

    /// queues `item`, waiting for a free slot
    pub fn submit(&self, item: T) -> Result<(), Rejected<T>> {
        let Some(sender) = &self.sender else {
            return Err(Rejected::Closed(item));
        };
        sender.send(item).map_err(|e| Rejected::Closed(e.0))
    }

    /// Closes the queue and waits up to `grace` for the workers to finish.
    ///
    /// Queued items are still handed to workers. Workers still running at the
    /// deadline are left detached; their number is returned.
    pub fn shutdown(mut self, grace: Duration) -> usize {
        drop(self.sender.take());

        let deadline = Instant::now() + grace;
        let mut abandoned = 0;
        for worker in self.workers.drain(..) {
            while !worker.thread.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }

            if worker.thread.is_finished() {
                if worker.thread.join().is_err() {
                    warn!("Worker {} terminated abnormally", worker.id);
                }
            } else {
                warn!("Worker {} still busy after the shutdown grace period", worker.id);
                abandoned += 1;
            }
        }
        abandoned
    }
}
