//! Read and write exclusion for the shared transport.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use super::DuplexMode;

/// Locks serialising access to each direction of the transport.
///
/// On a half-duplex link both directions share one lock.
#[derive(Clone, Debug)]
pub(crate) struct LinkLocks {
    read: Arc<Mutex<()>>,
    write: Arc<Mutex<()>>,
}

impl LinkLocks {
    pub(crate) fn new(duplex: DuplexMode) -> Self {
        let read = Arc::new(Mutex::new(()));
        let write = match duplex {
            DuplexMode::Full => Arc::new(Mutex::new(())),
            DuplexMode::Half => Arc::clone(&read),
        };
        Self { read, write }
    }

    pub(crate) async fn read(&self) -> MutexGuard<'_, ()> { self.read.lock().await }

    pub(crate) async fn write(&self) -> MutexGuard<'_, ()> { self.write.lock().await }

    pub(crate) fn is_shared(&self) -> bool { Arc::ptr_eq(&self.read, &self.write) }
}
