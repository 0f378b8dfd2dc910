//! File-backed persistence for the lifetime bottle counter and last fault
//! code, the host equivalent of a controller's key-value flash store.

use crate::error::HwError;
use crate::util::write_atomic;
use filler_traits::FaultStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Record {
    #[serde(default)]
    bottle_count: u32,
    #[serde(default)]
    last_fault_code: u8,
}

/// TOML-file persistence. Writes are atomic (write-then-rename); a missing
/// or unreadable file reads back as the default record, never an error, so
/// a corrupt counter file cannot keep the station from booting.
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Record {
        match fs::read_to_string(&self.path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(rec) => rec,
                Err(e) => {
                    debug!(path = %self.path.display(), error = %e, "corrupt record, using defaults");
                    Record::default()
                }
            },
            Err(_) => Record::default(),
        }
    }

    fn save(&self, rec: &Record) -> Result<(), HwError> {
        let text = toml::to_string(rec).map_err(|e| HwError::Persist(e.to_string()))?;
        write_atomic(&self.path, text.as_bytes())?;
        Ok(())
    }
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

impl FaultStore for FilePersistence {
    fn load_bottle_count(&mut self) -> Result<u32, BoxError> {
        Ok(self.load().bottle_count)
    }

    fn save_bottle_count(&mut self, count: u32) -> Result<(), BoxError> {
        let mut rec = self.load();
        rec.bottle_count = count;
        self.save(&rec)?;
        Ok(())
    }

    fn load_fault_code(&mut self) -> Result<u8, BoxError> {
        Ok(self.load().last_fault_code)
    }

    fn save_fault_code(&mut self, code: u8) -> Result<(), BoxError> {
        let mut rec = self.load();
        rec.last_fault_code = code;
        self.save(&rec)?;
        Ok(())
    }
}
