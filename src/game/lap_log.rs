//! Lap counter persistence

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum LapLogError {
    #[error("Lap log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lap log encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sink for the current lap counts. Failures never stop the race.
pub trait LapLog: Send {
    fn record(&mut self, lap_counts: &[u32]) -> Result<(), LapLogError>;
}

/// Keeps a file containing only the latest lap counts as a JSON array
#[derive(Debug)]
pub struct LapLogFile {
    file: File,
}

impl LapLogFile {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LapLogError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file })
    }
}

impl LapLog for LapLogFile {
    fn record(&mut self, lap_counts: &[u32]) -> Result<(), LapLogError> {
        let encoded = serde_json::to_vec(lap_counts)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&encoded)?;
        self.file.set_len(encoded.len() as u64)?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("race_relay_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_record_overwrites_previous_counts() {
        let path = temp_path("overwrite");
        let mut log = LapLogFile::create(&path).unwrap();

        log.record(&[10, 20, 30]).unwrap();
        log.record(&[1, 2]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "[1,2]");

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_create_fails_for_missing_directory() {
        let path = std::env::temp_dir()
            .join("race_relay_missing_dir_for_test")
            .join("laps.json");
        assert!(matches!(LapLogFile::create(path), Err(LapLogError::Io(_))));
    }
}
