//! Worker threads sharing one request queue

use std::cell::Cell;
use std::io;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use regex_lite::Regex;

use super::{Completion, Payload, Request, Transport, UreqTransport};
use crate::error::RequestError;

/// Marker of the interactive "please refresh" page some servers send with a
/// 200 status instead of a 503
const REFRESH_MARKER: &str = "http-equiv=\"refresh\"";

/// Invalid fragment the server has been seen to inject into JSON bodies
static MISSING_STATUS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"Couldn't find Status with ID=[0-9]*,").ok());

thread_local! {
    /// Address of the single-worker pool this thread is draining, or 0
    static DRAINING: Cell<usize> = const { Cell::new(0) };
}

/// Item on the shared queue
enum Job {
    /// Execute a request
    Work(Request),
    /// Stop the worker that receives this
    Stop,
}

/// Fixed set of workers executing HTTP requests off the caller's thread.
///
/// With more than one worker, each runs on its own thread and picks requests
/// from the shared queue as it becomes free. With a single worker no thread is
/// started: the caller runs queued work with [`WorkerPool::drain`]. A pool
/// that could not start any thread falls back to that mode.
pub struct WorkerPool {
    queue: Sender<Job>,
    receiver: Receiver<Job>,
    transport: Arc<dyn Transport>,
    handles: Vec<JoinHandle<()>>,
    workers: usize,
    threaded: bool,
    drain_lock: Mutex<()>,
    closed: bool,
}

impl WorkerPool {
    /// Create a pool of `workers` workers using the default HTTP transport
    pub fn new(workers: usize) -> Self {
        Self::with_transport(workers, Arc::new(UreqTransport::new()))
    }

    /// Create a pool of `workers` workers executing requests with `transport`
    pub fn with_transport(workers: usize, transport: Arc<dyn Transport>) -> Self {
        Self::build(workers, transport, |name, worker| {
            thread::Builder::new().name(name).spawn(move || worker.run())
        })
    }

    fn build<S>(workers: usize, transport: Arc<dyn Transport>, mut spawn: S) -> Self
    where
        S: FnMut(String, Worker) -> io::Result<JoinHandle<()>>,
    {
        let mut workers = workers.max(1);
        let (queue, receiver) = unbounded();

        let mut handles = Vec::new();
        if workers > 1 {
            for id in 1..=workers {
                tracing::debug!("Starting worker {id}");
                let worker = Worker {
                    id,
                    queue: receiver.clone(),
                    transport: Arc::clone(&transport),
                };
                match spawn(format!("mitter-worker-{id}"), worker) {
                    Ok(handle) => handles.push(handle),
                    Err(e) => tracing::error!("Failed to start worker {id}: {e}"),
                }
            }

            if handles.is_empty() {
                tracing::error!("No worker thread started, running requests on the caller");
                workers = 1;
            } else {
                workers = handles.len();
            }
        }

        Self {
            queue,
            receiver,
            transport,
            threaded: !handles.is_empty(),
            handles,
            workers,
            drain_lock: Mutex::new(()),
            closed: false,
        }
    }

    /// Number of workers in the pool
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Whether requests run on background threads
    pub const fn is_threaded(&self) -> bool {
        self.threaded
    }

    /// Queue a request. Never blocks.
    ///
    /// A pool that was shut down refuses the request and completes it on the
    /// calling thread with [`RequestError::Closed`].
    pub fn submit(&self, request: Request) {
        if self.closed {
            tracing::warn!("Request to {} submitted after shutdown", request.url);
            request.complete(Err(RequestError::Closed));
            return;
        }

        tracing::debug!("Queueing {} {}", request.method(), request.url);
        // The pool owns a receiver, so the channel cannot be disconnected.
        if let Err(e) = self.queue.send(Job::Work(request)) {
            if let Job::Work(request) = e.into_inner() {
                request.complete(Err(RequestError::Closed));
            }
        }
    }

    /// Run every queued request on the calling thread.
    ///
    /// Only meaningful for a single-worker pool; threaded pools process their
    /// queue on their own. Concurrent callers take turns, so every request
    /// queued before the call has completed when it returns. A call made from
    /// inside one of this pool's callbacks returns at once and its requests
    /// run after that callback.
    pub fn drain(&self) {
        if self.is_threaded() {
            tracing::warn!("drain() called on a threaded pool, ignoring");
            return;
        }
        let id = std::ptr::from_ref(self) as usize;
        if DRAINING.get() == id {
            tracing::trace!("Nested drain, left to the running one");
            return;
        }

        let _turn = self.drain_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _draining = DrainGuard::enter(id);
        let worker = Worker {
            id: 0,
            queue: self.receiver.clone(),
            transport: Arc::clone(&self.transport),
        };
        worker.run_pending();
    }

    /// Stop every worker, waiting for queued requests to complete.
    ///
    /// No callback runs after this returns. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }

        if self.is_threaded() {
            for _ in 0..self.handles.len() {
                tracing::debug!("Adding stop for the workers");
                let _ = self.queue.send(Job::Stop);
            }

            tracing::debug!("Waiting for workers to finish");
            for handle in self.handles.drain(..) {
                if handle.join().is_err() {
                    tracing::error!("A worker thread panicked");
                }
            }
        } else {
            self.drain();
        }

        self.closed = true;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Marks the current thread as draining a pool until dropped
struct DrainGuard {
    previous: usize,
}

impl DrainGuard {
    fn enter(pool: usize) -> Self {
        Self {
            previous: DRAINING.replace(pool),
        }
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.set(self.previous);
    }
}

/// One consumer of the shared queue
struct Worker {
    id: usize,
    queue: Receiver<Job>,
    transport: Arc<dyn Transport>,
}

impl Worker {
    fn run(&self) {
        loop {
            tracing::trace!("Worker {} waiting for work", self.id);
            match self.queue.recv() {
                Ok(Job::Work(request)) => self.process(request),
                Ok(Job::Stop) | Err(_) => {
                    tracing::debug!("Worker {} done", self.id);
                    break;
                }
            }
        }
    }

    /// Process queued work until the queue is empty
    fn run_pending(&self) {
        while let Ok(job) = self.queue.try_recv() {
            if let Job::Work(request) = job {
                self.process(request);
            }
        }
        tracing::trace!("Worker {} drained the queue", self.id);
    }

    fn process(&self, request: Request) {
        let result = self
            .transport
            .execute(&request)
            .and_then(|body| finish(body, request.decode_json));

        match &result {
            Err(e) => tracing::info!("Request to {} failed: {e}", request.url),
            Ok(Payload::Json(serde_json::Value::Null)) => {
                tracing::info!("Request to {} returned an empty body", request.url);
            }
            Ok(_) => tracing::trace!("Worker {} completed {}", self.id, request.url),
        }

        request.complete(result);
    }
}

/// Turn a successful response body into the payload handed to the callback
fn finish(body: Vec<u8>, decode_json: bool) -> Completion {
    if !decode_json {
        return Ok(Payload::Raw(body));
    }
    decode_json_body(&body).map(Payload::Json)
}

/// Parse a JSON body, recovering from the server's known misbehaviours
fn decode_json_body(body: &[u8]) -> Result<serde_json::Value, RequestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }

    let text = String::from_utf8_lossy(body).into_owned();
    let text = match MISSING_STATUS.as_ref() {
        Some(re) => re.replace_all(&text, "").into_owned(),
        None => text,
    };

    serde_json::from_str(&text).map_err(|e| {
        tracing::error!("Exception while parsing json: {e}");
        if text.to_ascii_lowercase().contains(REFRESH_MARKER) {
            RequestError::Status(503)
        } else {
            tracing::debug!("Unparseable body:\n{text}");
            RequestError::Decode(e.to_string())
        }
    })
}
