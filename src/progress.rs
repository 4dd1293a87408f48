use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Upload percentage of a single file. Each file owns its own cell, so a
/// change is observed by whoever subscribed to that file without any
/// refresh of the whole map.
#[derive(Debug, Clone)]
pub struct ProgressCell {
    tx: Arc<watch::Sender<u8>>,
}

impl ProgressCell {
    fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Record cumulative transport progress as `ceil(loaded / total * 100)`.
    /// The stored value never goes down and never exceeds 100.
    pub fn report(&self, loaded: u64, total: u64) {
        let pct = percentage(loaded, total);
        self.tx.send_if_modified(|current| {
            if pct > *current {
                *current = pct;
                true
            } else {
                false
            }
        });
    }

    /// Start a new attempt from zero.
    pub fn reset(&self) {
        self.tx.send_replace(0);
    }

    pub fn get(&self) -> u8 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.tx.subscribe()
    }
}

pub fn percentage(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let loaded = loaded.min(total) as u128;
    let total = total as u128;
    ((loaded * 100).div_ceil(total)) as u8
}

/// File name to progress cell. A key exists once that file's upload started.
#[derive(Debug, Default)]
pub struct UploadProgress {
    cells: HashMap<String, ProgressCell>,
}

impl UploadProgress {
    pub fn start(&mut self, file_name: &str) -> ProgressCell {
        let cell = ProgressCell::new();
        self.cells.insert(file_name.to_string(), cell.clone());
        cell
    }

    pub fn get(&self, file_name: &str) -> Option<u8> {
        self.cells.get(file_name).map(ProgressCell::get)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}
