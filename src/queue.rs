// Per-key write queue
//
// Each storage key gets its own worker lane. A lane applies writes strictly in
// submission order, so when several snapshots of the same key are in flight
// the last one submitted is the one left in storage.

use crate::kv::KeyValueStorage;
use eyre::{Result, eyre};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

struct Job {
    value: String,
    done: Sender<Result<()>>,
}

struct Lane {
    tx: Sender<Job>,
    handle: JoinHandle<()>,
}

/// Completion handle for one queued write
#[must_use = "dropping a ticket discards the write result"]
pub struct Ticket {
    key: String,
    rx: Receiver<Result<()>>,
}

impl Ticket {
    /// Block until the write has been applied
    pub fn wait(self) -> Result<()> {
        self.rx
            .recv()
            .map_err(|_| eyre!("Write lane for {} stopped before completing", self.key))?
    }
}

pub struct WriteQueue {
    storage: Arc<dyn KeyValueStorage>,
    lanes: HashMap<String, Lane>,
    closed: bool,
}

impl WriteQueue {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            lanes: HashMap::new(),
            closed: false,
        }
    }

    /// Queue `value` for `key` without waiting for it
    pub fn submit(&mut self, key: &str, value: String) -> Result<Ticket> {
        if self.closed {
            return Err(eyre!("Write queue is shut down"));
        }

        if !self.lanes.contains_key(key) {
            let lane = self.spawn_lane(key)?;
            self.lanes.insert(key.to_string(), lane);
        }

        let (done, rx) = mpsc::channel();
        let job = Job { value, done };

        let sent = match self.lanes.get(key) {
            Some(lane) => lane.tx.send(job).is_ok(),
            None => false,
        };

        if !sent {
            // The worker is gone (it can only exit by panicking); forget it so
            // the next submit starts a fresh lane.
            if let Some(lane) = self.lanes.remove(key) {
                let _ = lane.handle.join();
            }
            return Err(eyre!("Write lane for {} is not running", key));
        }

        Ok(Ticket {
            key: key.to_string(),
            rx,
        })
    }

    /// Queue `value` for `key` and wait until it has been applied
    pub fn write(&mut self, key: &str, value: String) -> Result<()> {
        self.submit(key, value)?.wait()
    }

    /// Number of keys with a running lane
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drain every lane and stop its worker. Further submits fail.
    pub fn shutdown(&mut self) {
        self.closed = true;
        for (key, lane) in self.lanes.drain() {
            drop(lane.tx);
            if lane.handle.join().is_err() {
                warn!(key = %key, "Write lane panicked");
            }
        }
    }

    fn spawn_lane(&self, key: &str) -> Result<Lane> {
        let (tx, rx) = mpsc::channel::<Job>();
        let storage = Arc::clone(&self.storage);
        let lane_key = key.to_string();

        let handle = thread::Builder::new()
            .name(format!("kv-writer-{}", key))
            .spawn(move || {
                for job in rx {
                    let result = storage.set(&lane_key, &job.value);
                    if let Err(e) = &result {
                        warn!(key = %lane_key, error = ?e, "Storage write failed");
                    }
                    // The submitter may have dropped its ticket
                    let _ = job.done.send(result);
                }
                debug!(key = %lane_key, "Write lane drained");
            })?;

        debug!(key, "Started write lane");
        Ok(Lane { tx, handle })
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStorage;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every value written, slowly, to widen any reordering window
    #[derive(Default)]
    struct SlowRecorder {
        inner: MemoryStorage,
        history: Mutex<Vec<(String, String)>>,
    }

    impl KeyValueStorage for SlowRecorder {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            thread::sleep(Duration::from_millis(1));
            self.history.lock().unwrap().push((key.to_string(), value.to_string()));
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys()
        }
    }

    struct Broken;

    impl KeyValueStorage for Broken {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(eyre!("disk full"))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }

        fn keys(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_writes_apply_in_submission_order() {
        let storage = Arc::new(SlowRecorder::default());
        let mut queue = WriteQueue::new(storage.clone());

        let tickets: Vec<Ticket> = (0..20)
            .map(|i| queue.submit("k", format!("[{}]", i)).unwrap())
            .collect();
        for ticket in tickets {
            ticket.wait().unwrap();
        }

        let history = storage.history.lock().unwrap();
        let values: Vec<&str> = history.iter().map(|(_, v)| v.as_str()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("[{}]", i)).collect();
        assert_eq!(values, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("[19]"));
    }

    #[test]
    fn test_one_lane_per_key() {
        let storage = Arc::new(MemoryStorage::new());
        let mut queue = WriteQueue::new(storage.clone());

        queue.write("a", "1".to_string()).unwrap();
        queue.write("b", "2".to_string()).unwrap();
        queue.write("a", "3".to_string()).unwrap();

        assert_eq!(queue.lane_count(), 2);
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("3"));
        assert_eq!(storage.get("b").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let mut queue = WriteQueue::new(Arc::new(Broken));
        let err = queue.write("k", "v".to_string()).unwrap_err();
        assert!(err.to_string().contains("disk full"));

        // The lane survives a failed write
        assert!(queue.write("k", "v".to_string()).is_err());
        assert_eq!(queue.lane_count(), 1);
    }

    #[test]
    fn test_shutdown_drains_pending_writes() {
        let storage = Arc::new(SlowRecorder::default());
        let mut queue = WriteQueue::new(storage.clone());

        for i in 0..5 {
            let _ = queue.submit("k", i.to_string()).unwrap();
        }
        queue.shutdown();

        assert!(queue.is_closed());
        assert_eq!(queue.lane_count(), 0);
        assert_eq!(storage.history.lock().unwrap().len(), 5);
        assert!(queue.submit("k", "late".to_string()).is_err());
    }
}
