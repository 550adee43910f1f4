//! Staleness sweep
//!
//! A mount is stale once the archive it was opened from is deleted, becomes
//! unreadable, or changes size or modification time. Stale mounts are evicted
//! even while references are outstanding; their handles go defunct.

use std::fs::File;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;

use crate::mount_pool::{BackingFile, FileSnapshot, MountPool};

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records looked at
    pub checked: usize,
    /// Records removed because their backing file drifted
    pub evicted: usize,
    /// Records without a tracked backing file
    pub skipped: usize,
    /// Records whose backing file could not be checked this pass
    pub unverified: usize,
}

impl BackingFile {
    /// Whether the file is gone, unreadable or changed since mount time
    fn has_drifted(&self) -> io::Result<bool> {
        if let Err(e) = File::open(&self.path) {
            return if is_gone(&e) { Ok(true) } else { Err(e) };
        }

        match FileSnapshot::capture(&self.path) {
            Ok(current) => Ok(current != self.snapshot),
            Err(e) if is_gone(&e) => Ok(true),
            Err(e) => Err(e),
        }
    }
}

fn is_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}

impl MountPool {
    /// Evict every mount whose backing file changed since it was mounted
    ///
    /// The backing files are checked without holding the pool lock. A record
    /// released or replaced in the meantime is left alone.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        for record in self.records() {
            report.checked += 1;

            let Some(backing) = record.backing() else {
                tracing::debug!(key = %record.key(), "mount not backed by a file, skipping");
                report.skipped += 1;
                continue;
            };

            match backing.has_drifted() {
                Ok(false) => {}
                Ok(true) => {
                    let references = record.references();
                    if self.evict(&record) {
                        tracing::info!(
                            key = %record.key(),
                            path = %backing.path.display(),
                            references,
                            "backing file removed or changed, evicted mount"
                        );
                        report.evicted += 1;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        key = %record.key(),
                        path = %backing.path.display(),
                        error = %e,
                        "unable to verify backing file"
                    );
                    report.unverified += 1;
                }
            }
        }

        tracing::debug!(
            checked = report.checked,
            evicted = report.evicted,
            skipped = report.skipped,
            unverified = report.unverified,
            "sweep finished"
        );
        report
    }
}

/// Runs [`MountPool::sweep`] at a fixed interval on a background thread
#[derive(Debug)]
pub struct SweepScheduler {
    stop: Option<flume::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SweepScheduler {
    pub fn spawn(pool: MountPool, interval: Duration) -> io::Result<Self> {
        let (stop_tx, stop_rx) = flume::bounded::<()>(1);

        let thread = thread::Builder::new()
            .name("mount-sweeper".to_string())
            .spawn(move || {
                tracing::debug!(interval_ms = interval.as_millis() as u64, "mount sweeper started");
                // A stop message or a dropped sender both end the loop
                while let Err(flume::RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
                    pool.sweep();
                }
                tracing::debug!("mount sweeper stopped");
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Stop the sweeper and wait for the running pass to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("mount sweeper thread panicked");
            }
        }
    }
}

impl Drop for SweepScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
