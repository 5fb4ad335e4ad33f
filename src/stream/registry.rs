// In: src/stream/registry.rs

//! The handle registry behind the stream bridge.
//!
//! Native worker threads may call back into the registry concurrently, so the
//! map is a `DashMap` and each stream sits behind its own mutex. Handles come
//! from a monotonic counter and are never reissued.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use dashmap::DashMap;

use crate::error::{CarrowError, Result};

/// A registered host byte source and what the bridge knows about it.
pub(crate) struct InStream {
    reader: Box<dyn Read + Send>,
    position: i64,
    closed: bool,
}

impl InStream {
    /// Fills as much of `buf` as the reader allows. Reaching end-of-stream
    /// marks the stream closed; the bytes read so far are still returned.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() && !self.closed {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => self.closed = true,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.position += filled as i64;
        Ok(filled)
    }
}

pub(crate) struct StreamRegistry {
    streams: DashMap<i64, Arc<Mutex<InStream>>>,
    next_handle: AtomicI64,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self {
            streams: DashMap::new(),
            next_handle: AtomicI64::new(1),
        }
    }

    /// Registers `reader` under a handle that has never been issued before.
    pub fn alloc(&self, reader: Box<dyn Read + Send>) -> i64 {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        let stream = InStream {
            reader,
            position: 0,
            closed: false,
        };
        self.streams.insert(handle, Arc::new(Mutex::new(stream)));
        log::debug!("stream {} registered", handle);
        handle
    }

    pub fn release(&self, handle: i64) -> Result<()> {
        match self.streams.remove(&handle) {
            Some(_) => {
                log::debug!("stream {} released", handle);
                Ok(())
            }
            None => Err(CarrowError::UnknownHandle(handle)),
        }
    }

    fn get(&self, handle: i64) -> Result<Arc<Mutex<InStream>>> {
        // Clone out of the map so no shard lock is held while the stream is in use.
        self.streams
            .get(&handle)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(CarrowError::UnknownHandle(handle))
    }

    fn lock(stream: &Mutex<InStream>) -> MutexGuard<'_, InStream> {
        stream.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn read(&self, handle: i64, buf: &mut [u8]) -> Result<usize> {
        let stream = self.get(handle)?;
        let n = Self::lock(&stream).read(buf)?;
        Ok(n)
    }

    pub fn tell(&self, handle: i64) -> Result<i64> {
        let stream = self.get(handle)?;
        let position = Self::lock(&stream).position;
        Ok(position)
    }

    pub fn closed(&self, handle: i64) -> Result<bool> {
        let stream = self.get(handle)?;
        let closed = Self::lock(&stream).closed;
        Ok(closed)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }
}

/// The registry shared by every `read_csv` call in the process.
pub(crate) fn registry() -> &'static StreamRegistry {
    static REGISTRY: OnceLock<StreamRegistry> = OnceLock::new();
    REGISTRY.get_or_init(StreamRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_handles_are_never_reused() {
        let registry = StreamRegistry::new();
        let a = registry.alloc(Box::new(Cursor::new(Vec::new())));
        registry.release(a).unwrap();
        let b = registry.alloc(Box::new(Cursor::new(Vec::new())));
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_released_handle_is_unknown() {
        let registry = StreamRegistry::new();
        let h = registry.alloc(Box::new(Cursor::new(b"abc".to_vec())));
        registry.release(h).unwrap();

        let mut buf = [0u8; 4];
        let err = registry.read(h, &mut buf).unwrap_err();
        assert_eq!(err.to_string(), format!("{}: unknown id", h));
        assert!(matches!(registry.tell(h), Err(CarrowError::UnknownHandle(_))));
        assert!(matches!(registry.closed(h), Err(CarrowError::UnknownHandle(_))));
        assert!(matches!(registry.release(h), Err(CarrowError::UnknownHandle(_))));
    }

    #[test]
    fn test_read_tracks_position_and_end_of_stream() {
        let registry = StreamRegistry::new();
        let h = registry.alloc(Box::new(Cursor::new(b"hello world".to_vec())));
        let mut buf = [0u8; 8];

        assert_eq!(registry.read(h, &mut buf).unwrap(), 8);
        assert_eq!(&buf, b"hello wo");
        assert_eq!(registry.tell(h).unwrap(), 8);
        assert!(!registry.closed(h).unwrap());

        // Short read at the end still returns the remaining bytes.
        assert_eq!(registry.read(h, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"rld");
        assert!(registry.closed(h).unwrap());
        assert_eq!(registry.read(h, &mut buf).unwrap(), 0);
        assert_eq!(registry.tell(h).unwrap(), 11);
    }

    #[test]
    fn test_concurrent_alloc_yields_distinct_handles() {
        let registry = StreamRegistry::new();
        let handles: Vec<i64> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        (0..100)
                            .map(|_| registry.alloc(Box::new(std::io::empty())))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
        });
        let mut unique = handles.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 800);
        assert_eq!(registry.len(), 800);
    }
}
