//! File-backed segment storage: one JSONL file per segment.
//!
//! Envelopes are appended as newline-delimited JSON and fsynced before the
//! append is considered committed.  A crash can therefore leave at most a
//! torn final line, which `read_segment` discards as uncommitted — it never
//! surfaces as a valid envelope.  Secure deletion overwrites the file with
//! zeros and syncs before unlinking.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use vigil_contracts::{EncryptedEnvelope, VigilError, VigilResult};

use crate::storage::{SegmentMeta, SegmentStorage};

/// Segment storage rooted at a directory, one `segment-NNNNNNNN.jsonl`
/// file per segment plus a `.sealed` marker once rotation closes it.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) a storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> VigilResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| VigilError::StorageFailure {
            reason: format!("failed to create storage dir '{}': {}", dir.display(), e),
        })?;
        Ok(Self { dir })
    }

    fn segment_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("segment-{:08}.jsonl", index))
    }

    fn sealed_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("segment-{:08}.sealed", index))
    }

    fn read_envelopes(&self, path: &Path, index: u64) -> VigilResult<Vec<EncryptedEnvelope>> {
        let contents = fs::read_to_string(path).map_err(|e| VigilError::StorageFailure {
            reason: format!("failed to read segment file '{}': {}", path.display(), e),
        })?;

        let lines: Vec<&str> = contents.lines().collect();
        let mut envelopes = Vec::with_capacity(lines.len());
        for (pos, line) in lines.iter().enumerate() {
            match serde_json::from_str::<EncryptedEnvelope>(line) {
                Ok(envelope) => envelopes.push(envelope),
                // A torn final line is an uncommitted append from a crash
                // mid-write.  Anywhere else it is corruption.
                Err(e) if pos == lines.len() - 1 && !contents.ends_with('\n') => {
                    warn!(
                        segment = index,
                        "discarding torn final line in segment file: {}", e
                    );
                }
                Err(e) => {
                    return Err(VigilError::StorageFailure {
                        reason: format!(
                            "segment {} line {} is not a valid envelope: {}",
                            index,
                            pos + 1,
                            e
                        ),
                    });
                }
            }
        }
        Ok(envelopes)
    }
}

impl SegmentStorage for FileStorage {
    fn create_segment(&self, index: u64) -> VigilResult<()> {
        let path = self.segment_path(index);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| VigilError::StorageFailure {
                reason: format!("failed to create segment file '{}': {}", path.display(), e),
            })?;
        Ok(())
    }

    fn append_envelope(&self, index: u64, envelope: &EncryptedEnvelope) -> VigilResult<()> {
        if self.sealed_path(index).exists() {
            return Err(VigilError::StorageFailure {
                reason: format!("segment {} is sealed", index),
            });
        }

        let line = serde_json::to_string(envelope).map_err(|e| VigilError::StorageFailure {
            reason: format!("failed to serialize envelope: {}", e),
        })?;

        let path = self.segment_path(index);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| VigilError::StorageFailure {
                reason: format!("failed to open segment file '{}': {}", path.display(), e),
            })?;

        file.write_all(format!("{}\n", line).as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| VigilError::StorageFailure {
                reason: format!("failed to append to segment {}: {}", index, e),
            })
    }

    fn read_segment(&self, index: u64) -> VigilResult<Vec<EncryptedEnvelope>> {
        let path = self.segment_path(index);
        if !path.exists() {
            return Err(VigilError::StorageFailure {
                reason: format!("segment {} does not exist", index),
            });
        }
        self.read_envelopes(&path, index)
    }

    fn list_segments(&self) -> VigilResult<Vec<SegmentMeta>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| VigilError::StorageFailure {
            reason: format!("failed to list storage dir '{}': {}", self.dir.display(), e),
        })?;

        let mut indexes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VigilError::StorageFailure {
                reason: format!("failed to read storage dir entry: {}", e),
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(index) = name
                .strip_prefix("segment-")
                .and_then(|s| s.strip_suffix(".jsonl"))
                .and_then(|s| s.parse::<u64>().ok())
            {
                indexes.push(index);
            }
        }
        indexes.sort_unstable();

        let mut metas = Vec::with_capacity(indexes.len());
        for index in indexes {
            let envelopes = self.read_envelopes(&self.segment_path(index), index)?;
            metas.push(SegmentMeta {
                index,
                sealed: self.sealed_path(index).exists(),
                envelope_count: envelopes.len(),
                newest_created_at: envelopes.last().map(|e| e.created_at),
            });
        }
        Ok(metas)
    }

    fn seal_segment(&self, index: u64) -> VigilResult<()> {
        let path = self.sealed_path(index);
        File::create(&path)
            .and_then(|f| f.sync_all())
            .map_err(|e| VigilError::StorageFailure {
                reason: format!("failed to seal segment {}: {}", index, e),
            })
    }

    fn secure_delete_segment(&self, index: u64) -> VigilResult<()> {
        let path = self.segment_path(index);
        let overwrite = || -> std::io::Result<()> {
            let mut file = OpenOptions::new().write(true).open(&path)?;
            let len = file.metadata()?.len();
            file.seek(SeekFrom::Start(0))?;
            // Overwrite in bounded chunks so large segments do not need a
            // single allocation of their full size.
            let zeros = vec![0u8; 64 * 1024];
            let mut remaining = len as usize;
            while remaining > 0 {
                let n = remaining.min(zeros.len());
                file.write_all(&zeros[..n])?;
                remaining -= n;
            }
            file.sync_all()?;
            fs::remove_file(&path)?;
            Ok(())
        };
        overwrite().map_err(|e| VigilError::StorageFailure {
            reason: format!("failed to securely delete segment {}: {}", index, e),
        })?;

        let sealed = self.sealed_path(index);
        if sealed.exists() {
            fs::remove_file(&sealed).map_err(|e| VigilError::StorageFailure {
                reason: format!("failed to remove seal marker for segment {}: {}", index, e),
            })?;
        }
        Ok(())
    }
}
