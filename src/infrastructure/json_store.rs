use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::domain::errors::StoreError;
use crate::domain::order::Order;
use crate::domain::ports::OrderStore;

/// The local order set, kept as one pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "orders.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl OrderStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Order>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let Value::Array(records) = serde_json::from_str::<Value>(&raw)? else {
            return Err(StoreError::NotAnArray);
        };
        let (orders, skipped) = Order::from_records(records);
        if skipped > 0 {
            log::warn!(
                "Skipped {} malformed records while loading {}",
                skipped,
                self.path.display()
            );
        }
        Ok(orders)
    }

    fn save(&self, orders: &[Order]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(orders)?;

        // Temp file next to the target, then rename over it.
        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        log::debug!("Wrote {} orders to {}", orders.len(), self.path.display());
        Ok(())
    }
}
