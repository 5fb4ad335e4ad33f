// In: src/store/server.rs

//! An in-memory object store listening on a Unix domain socket.
//!
//! Objects are immutable once sealed. Readers that ask for a missing object
//! block on a condition variable until a writer seals it or their deadline
//! passes; nothing polls.

use std::io::{BufReader, BufWriter};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hashbrown::HashMap;

use super::protocol::{ObjectKey, Request, Response};

#[derive(Default)]
struct StoreState {
    objects: Mutex<HashMap<ObjectKey, Arc<Vec<u8>>>>,
    sealed: Condvar,
}

impl StoreState {
    fn objects(&self) -> MutexGuard<'_, HashMap<ObjectKey, Arc<Vec<u8>>>> {
        // A panicking connection thread can't leave the map half-updated.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle(&self, request: Request) -> Response {
        match request {
            Request::Put { id, data } => {
                let mut objects = self.objects();
                if objects.contains_key(&id) {
                    return Response::Error(format!("object {} already exists", hex::encode(id)));
                }
                log::debug!("store: sealed object {} ({} bytes)", hex::encode(id), data.len());
                objects.insert(id, Arc::new(data));
                self.sealed.notify_all();
                Response::Ok
            }
            Request::Get { id, timeout_ms } => {
                let objects = self.objects();
                let (objects, _) = self
                    .sealed
                    .wait_timeout_while(objects, Duration::from_millis(timeout_ms), |objects| {
                        !objects.contains_key(&id)
                    })
                    .unwrap_or_else(|e| e.into_inner());
                match objects.get(&id) {
                    Some(data) => Response::Data(data.as_ref().clone()),
                    None => Response::Timeout(format!(
                        "timed out after {} ms waiting for object {}",
                        timeout_ms,
                        hex::encode(id)
                    )),
                }
            }
            Request::Delete { id } => match self.objects().remove(&id) {
                Some(_) => Response::Ok,
                None => Response::Error(format!("object {} not found", hex::encode(id))),
            },
            Request::Contains { id } => Response::Bool(self.objects().contains_key(&id)),
            Request::Disconnect => Response::Ok,
        }
    }
}

/// A bound, not yet running store.
pub struct StoreServer {
    listener: UnixListener,
    path: PathBuf,
    state: Arc<StoreState>,
}

impl StoreServer {
    pub fn bind(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let listener = UnixListener::bind(&path)?;
        log::info!("store: listening on {}", path.display());
        Ok(Self {
            listener,
            path,
            state: Arc::default(),
        })
    }

    /// Starts accepting connections on a background thread, one thread per client.
    pub fn spawn(self) -> std::io::Result<StoreHandle> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let StoreServer { listener, path, state } = self;

        let thread = thread::Builder::new()
            .name("carrow-store".into())
            .spawn(move || {
                for stream in listener.incoming() {
                    if stop.load(Ordering::Acquire) {
                        break;
                    }
                    match stream {
                        Ok(stream) => {
                            let state = Arc::clone(&state);
                            thread::spawn(move || serve_client(stream, state));
                        }
                        Err(e) => log::warn!("store: accept failed: {}", e),
                    }
                }
            })?;

        Ok(StoreHandle {
            path,
            shutdown,
            thread: Some(thread),
        })
    }
}

fn serve_client(stream: UnixStream, state: Arc<StoreState>) {
    let mut reader = match stream.try_clone() {
        Ok(s) => BufReader::new(s),
        Err(e) => {
            log::warn!("store: can't clone client socket: {}", e);
            return;
        }
    };
    let mut writer = BufWriter::new(stream);

    loop {
        let request = match Request::read_from(&mut reader) {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(e) => {
                log::warn!("store: dropping client after bad request: {}", e);
                break;
            }
        };
        let done = request == Request::Disconnect;
        if let Err(e) = state.handle(request).write_to(&mut writer) {
            log::warn!("store: can't answer client: {}", e);
            break;
        }
        if done {
            break;
        }
    }
    log::debug!("store: client disconnected");
}

/// A running store. Dropping it stops the accept loop and removes the socket file.
pub struct StoreHandle {
    path: PathBuf,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StoreHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::Release);
        // Wake the accept loop so it sees the flag.
        let _ = UnixStream::connect(&self.path);
        if thread.join().is_err() {
            log::warn!("store: accept thread panicked");
        }
        let _ = std::fs::remove_file(&self.path);
        log::info!("store: stopped {}", self.path.display());
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_put_twice_is_rejected() {
        let state = StoreState::default();
        let id = [3u8; 20];
        assert_eq!(state.handle(Request::Put { id, data: vec![1] }), Response::Ok);
        let second = state.handle(Request::Put { id, data: vec![2] });
        assert!(matches!(second, Response::Error(ref m) if m.contains("already exists")));
    }

    #[test]
    fn test_get_waits_for_a_late_writer() {
        let state = Arc::new(StoreState::default());
        let id = [9u8; 20];
        let writer = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                state.handle(Request::Put { id, data: b"late".to_vec() })
            })
        };
        let response = state.handle(Request::Get { id, timeout_ms: 5_000 });
        assert_eq!(response, Response::Data(b"late".to_vec()));
        writer.join().unwrap();
    }

    #[test]
    fn test_get_times_out_without_writer() {
        let state = StoreState::default();
        let start = Instant::now();
        let response = state.handle(Request::Get { id: [0u8; 20], timeout_ms: 100 });
        assert!(matches!(response, Response::Timeout(_)));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_delete_missing_object() {
        let state = StoreState::default();
        let response = state.handle(Request::Delete { id: [1u8; 20] });
        assert!(matches!(response, Response::Error(_)));
    }
}
