//! # Background threads
//!
//! Every long running component (pose sources, the telemetry source, the station finder, and the
//! docking controller) owns exactly one background thread. The thread is given a shared run flag
//! which it must check at least once per cycle, and is joined when the owner is dropped.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use comms_if::net::pubsub::Subscriber;
use log::{error, warn};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Longest single sleep taken by [`sleep_while_running`], bounding how late a stop is noticed.
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Receive timeout that listener subscribers should be configured with.
pub const LISTENER_POLL_TIMEOUT_MS: i32 = 1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to a cooperatively stopped background thread.
pub struct BgThread {
    name: String,
    jh: Option<JoinHandle<()>>,
    run: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BgThread {
    /// Spawn a new named background thread.
    ///
    /// The closure is passed the run flag, it must return soon after the flag is cleared.
    pub fn spawn<F>(name: &str, f: F) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let run = Arc::new(AtomicBool::new(true));
        let run_clone = run.clone();

        let jh = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || f(run_clone))?;

        Ok(Self {
            name: name.to_string(),
            jh: Some(jh),
            run,
        })
    }

    /// Returns true until a stop has been requested.
    pub fn is_running(&self) -> bool {
        self.run.load(Ordering::Relaxed)
    }

    /// Request the thread to stop and wait for it to exit.
    pub fn stop(&mut self) {
        self.run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.jh.take() {
            if jh.join().is_err() {
                error!("Background thread \"{}\" panicked", self.name);
            }
        }
    }
}

impl Drop for BgThread {
    fn drop(&mut self) {
        self.stop();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Lock a mutex, recovering the data if another thread panicked while holding it.
///
/// Caches only ever hold plain data which is replaced wholesale, so a poisoned value is still
/// consistent.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Sleep for `duration`, returning early if `run` is cleared.
///
/// Returns the value of the run flag on exit.
pub fn sleep_while_running(run: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;

    while run.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(MAX_SLEEP_SLICE));
    }

    false
}

/// Pass every message received from `subscriber` to `on_msg` until `run` is cleared.
///
/// The run flag is checked once per receive, so the loop exits within one subscriber timeout of
/// the flag being cleared. Fatal subscriber errors also end the loop.
pub fn listen<T, F>(name: &str, subscriber: &mut dyn Subscriber<T>, run: &AtomicBool, mut on_msg: F)
where
    F: FnMut(T),
{
    while run.load(Ordering::Relaxed) {
        match subscriber.recv() {
            Ok(Some(msg)) => on_msg(msg),
            Ok(None) => continue,
            Err(e) if e.is_fatal() => {
                error!("{} listener stopped: {}", name, e);
                break;
            }
            Err(e) => warn!("{} listener dropped a message: {}", name, e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_stop_joins_thread() {
        let cycles = Arc::new(AtomicUsize::new(0));
        let cycles_clone = cycles.clone();

        let mut bg = BgThread::spawn("test_bg", move |run| {
            while run.load(Ordering::Relaxed) {
                cycles_clone.fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(bg.is_running());
        bg.stop();
        assert!(!bg.is_running());

        // Nothing runs after the join
        let after_stop = cycles.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(cycles.load(Ordering::Relaxed), after_stop);
        assert!(after_stop > 0);
    }

    #[test]
    fn test_sleep_interrupted_by_stop() {
        let run = Arc::new(AtomicBool::new(true));
        let run_clone = run.clone();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            run_clone.store(false, Ordering::Relaxed);
        });

        let start = Instant::now();
        assert!(!sleep_while_running(&run, Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));

        stopper.join().unwrap();
    }

    #[test]
    fn test_listen_exits_on_disconnect() {
        use comms_if::net::pubsub::ChannelSubscriber;
        use std::sync::mpsc::channel;

        let (tx, rx) = channel();
        let mut sub = ChannelSubscriber::new(rx, Duration::from_millis(1));
        let run = AtomicBool::new(true);

        tx.send(1u32).unwrap();
        tx.send(2u32).unwrap();
        drop(tx);

        let mut received = vec![];
        listen("test", &mut sub, &run, |m| received.push(m));

        assert_eq!(received, vec![1, 2]);
    }

    #[test]
    fn test_lock_recovers_poison() {
        let m = Arc::new(Mutex::new(3));
        let m_clone = m.clone();

        let _ = thread::spawn(move || {
            let _guard = m_clone.lock().unwrap();
            panic!("poison the mutex");
        })
        .join();

        assert!(m.is_poisoned());
        assert_eq!(*lock(&m), 3);
    }
}
