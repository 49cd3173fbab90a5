//! GPIO edge-interrupt monitor
//!
//! A [`Monitor`] owns one background thread per GPIO channel. The thread
//! waits on the pin's sysfs `value` node for priority events with a one
//! second tick, so that clearing the active flag is noticed promptly, and
//! feeds each reading through a [`Debouncer`] before invoking the callback.
//!
//! The debounce rules are kept separate from the thread so they can be
//! driven with synthetic timestamps.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::sys;

/// Minimum spacing between two accepted transitions
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

/// Poll tick of the monitor thread
pub(crate) const POLL_TICK: Duration = Duration::from_secs(1);

/// Edge acceptance state machine
///
/// A transition is accepted when the pin reads low, a high reading has been
/// seen since the last low, and at least [`DEBOUNCE_WINDOW`] has elapsed since
/// the last accepted transition. Holding the pin low never fires twice.
#[derive(Clone, Copy, Debug)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Instant,
    transition_seen: bool,
}

impl Debouncer {
    /// Start with `now` as the last accepted transition
    ///
    /// Edges within one window of start-up are therefore suppressed.
    pub fn new(now: Instant) -> Self {
        Self::with_window(now, DEBOUNCE_WINDOW)
    }

    /// Same as [`new`](Self::new) with a custom window
    pub fn with_window(now: Instant, window: Duration) -> Self {
        Self {
            window,
            last_accepted: now,
            transition_seen: true,
        }
    }

    /// Feed one level reading taken at `now`
    ///
    /// Returns `true` when the reading is an accepted transition.
    pub fn observe(&mut self, high: bool, now: Instant) -> bool {
        if high {
            self.transition_seen = true;
            return false;
        }

        let settled = now.saturating_duration_since(self.last_accepted) >= self.window;
        let accept = settled && self.transition_seen;
        if accept {
            self.last_accepted = now;
        }
        self.transition_seen = false;
        accept
    }
}

/// Handle to a running monitor thread
#[derive(Debug)]
pub(crate) struct Monitor {
    active: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Spawn a monitor for `pin`, watching `value_path`
    pub(crate) fn spawn<F>(pin: u32, value_path: PathBuf, callback: F) -> std::io::Result<Self>
    where
        F: FnMut(u32) + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);
        let handle = thread::Builder::new()
            .name(format!("gpio{pin}-irq"))
            .spawn(move || run(pin, &value_path, &flag, callback))?;
        info!("GPIO {pin}: interrupt monitor started");
        Ok(Self {
            active,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still watching
    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Clear the active flag and join the thread
    pub(crate) fn stop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("interrupt monitor thread panicked");
            }
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Interpret a value node's contents; anything but a number is no reading
fn parse_level(raw: &[u8]) -> Option<bool> {
    let text = core::str::from_utf8(raw).ok()?;
    text.trim().parse::<i64>().ok().map(|level| level != 0)
}

fn read_level(file: &mut File, scratch: &mut [u8]) -> std::io::Result<Option<bool>> {
    file.seek(SeekFrom::Start(0))?;
    let n = file.read(scratch)?;
    Ok(parse_level(&scratch[..n]))
}

fn run<F>(pin: u32, value_path: &Path, active: &AtomicBool, mut callback: F)
where
    F: FnMut(u32),
{
    let mut file = match File::open(value_path) {
        Ok(file) => file,
        Err(err) => {
            warn!("GPIO {pin}: cannot open {}: {err}", value_path.display());
            active.store(false, Ordering::Release);
            return;
        }
    };

    let mut scratch = [0u8; 64];
    // sysfs reports a pending event until the node has been read once
    let _ = read_level(&mut file, &mut scratch);
    let mut debouncer = Debouncer::new(Instant::now());

    while active.load(Ordering::Acquire) {
        match sys::wait_priority(file.as_fd(), POLL_TICK) {
            Ok(false) => {}
            Ok(true) => {
                let now = Instant::now();
                match read_level(&mut file, &mut scratch) {
                    Ok(Some(high)) => {
                        if debouncer.observe(high, now) {
                            debug!("GPIO {pin}: interrupt accepted");
                            callback(pin);
                        }
                    }
                    Ok(None) => debug!("GPIO {pin}: unreadable level skipped"),
                    Err(err) => warn!("GPIO {pin}: value read failed: {err}"),
                }
            }
            Err(err) => {
                warn!("GPIO {pin}: interrupt wait failed: {err}");
                active.store(false, Ordering::Release);
            }
        }
    }

    info!("GPIO {pin}: interrupt monitor stopped");
}
