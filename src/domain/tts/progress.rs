use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub progress: usize,
    pub total: usize,
    pub ready: bool,
    pub failed_words: Vec<String>,
}

#[derive(Default)]
struct Tally {
    done: usize,
    failed_words: Vec<String>,
}

/// Counts per-item completions of a batch and publishes a snapshot after each.
///
/// Only the final snapshot (`progress == total`) can be `ready`, and only when
/// nothing failed.
pub struct ProgressReporter {
    total: usize,
    tally: Mutex<Tally>,
    tx: Option<mpsc::UnboundedSender<ProgressUpdate>>,
}

impl ProgressReporter {
    pub fn channel(total: usize) -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = Self {
            total,
            tally: Mutex::new(Tally::default()),
            tx: Some(tx),
        };
        (reporter, rx)
    }

    /// Reporter that only counts
    pub fn silent(total: usize) -> Self {
        Self {
            total,
            tally: Mutex::new(Tally::default()),
            tx: None,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn record(&self, word: &str, succeeded: bool) {
        let update = {
            let mut tally = self.tally.lock();
            tally.done += 1;
            if !succeeded {
                tally.failed_words.push(word.to_string());
            }
            self.snapshot(&tally)
        };
        self.publish(update);
    }

    /// Publish the terminal record for an empty batch, which has no items to
    /// report it.
    pub fn finish(&self) {
        if self.total == 0 {
            let update = self.snapshot(&self.tally.lock());
            self.publish(update);
        }
    }

    pub fn failed_words(&self) -> Vec<String> {
        self.tally.lock().failed_words.clone()
    }

    fn snapshot(&self, tally: &Tally) -> ProgressUpdate {
        let complete = tally.done >= self.total;
        ProgressUpdate {
            progress: tally.done,
            total: self.total,
            ready: complete && tally.failed_words.is_empty(),
            failed_words: tally.failed_words.clone(),
        }
    }

    fn publish(&self, update: ProgressUpdate) {
        if let Some(tx) = &self.tx {
            // The receiver is gone when the client disconnected
            let _ = tx.send(update);
        }
    }
}
