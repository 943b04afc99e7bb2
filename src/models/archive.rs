//! Model artifact extraction.
//!
//! The artifact is a tar archive, usually gzip-compressed, holding a single
//! serialized model file. It is unpacked into a request-local temporary
//! directory that is removed when the returned [`ExtractedArtifact`] drops.

use crate::error::{EvalError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use tracing::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// An unpacked model artifact. Dropping it deletes the scratch directory.
#[derive(Debug)]
pub struct ExtractedArtifact {
    dir: TempDir,
    model_path: PathBuf,
}

impl ExtractedArtifact {
    /// Scratch directory holding the archive contents
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the model file inside the scratch directory
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

/// Unpacks model archives into scratch space
#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    /// Entry expected inside the archive
    model_file_name: String,
    /// Parent of the per-run scratch directory
    scratch_root: Option<PathBuf>,
}

impl ArtifactExtractor {
    pub fn new(model_file_name: impl Into<String>) -> Self {
        Self {
            model_file_name: model_file_name.into(),
            scratch_root: None,
        }
    }

    /// Place scratch directories under `root` instead of the system temp dir
    pub fn with_scratch_root(mut self, root: Option<PathBuf>) -> Self {
        self.scratch_root = root;
        self
    }

    /// Decompress `archive_path` fully and locate the model file
    pub fn extract<P: AsRef<Path>>(&self, archive_path: P) -> Result<ExtractedArtifact> {
        let archive_path = archive_path.as_ref();
        info!(path = %archive_path.display(), "Extracting model artifact");

        let mut file = File::open(archive_path)
            .map_err(|e| EvalError::corrupt(archive_path, format!("cannot open archive: {e}")))?;
        let gzipped = is_gzip(&mut file)
            .map_err(|e| EvalError::corrupt(archive_path, format!("cannot read archive: {e}")))?;

        let dir = self.scratch_dir()?;
        let reader = BufReader::new(file);
        let unpacked = if gzipped {
            Archive::new(GzDecoder::new(reader)).unpack(dir.path())
        } else {
            Archive::new(reader).unpack(dir.path())
        };
        unpacked.map_err(|e| EvalError::corrupt(archive_path, format!("cannot unpack archive: {e}")))?;

        let model_path = dir.path().join(&self.model_file_name);
        if !model_path.is_file() {
            return Err(EvalError::corrupt(
                archive_path,
                format!("archive has no '{}' entry", self.model_file_name),
            ));
        }

        debug!(
            scratch = %dir.path().display(),
            gzipped,
            "Model artifact unpacked"
        );
        info!(model = %model_path.display(), "Model artifact extracted");

        Ok(ExtractedArtifact { dir, model_path })
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("model-eval-");
        match &self.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| EvalError::io(root, e))?;
                builder.tempdir_in(root).map_err(|e| EvalError::io(root, e))
            }
            None => builder
                .tempdir()
                .map_err(|e| EvalError::io(std::env::temp_dir(), e)),
        }
    }
}

fn is_gzip(file: &mut File) -> std::io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut read = 0;
    while read < magic.len() {
        match file.read(&mut magic[read..])? {
            0 => break,
            n => read += n,
        }
    }
    file.seek(SeekFrom::Start(0))?;
    Ok(read == magic.len() && magic == GZIP_MAGIC)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;

    /// Write a `.tar.gz` holding `entries` under `dir`
    pub(crate) fn write_archive(dir: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("model.tar.gz");
        let file = File::create(&path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test]
    fn test_extracts_model_entry() {
        let dir = TempDir::new().unwrap();
        let archive = write_archive(dir.path(), &[("xgboost-model", &b"{}"[..])]);

        let extracted = ArtifactExtractor::new("xgboost-model")
            .extract(&archive)
            .unwrap();
        assert_eq!(fs::read(extracted.model_path()).unwrap(), b"{}");
    }

    #[test]
    fn test_scratch_dir_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let archive = write_archive(dir.path(), &[("xgboost-model", &b"{}"[..])]);
        let scratch_root = dir.path().join("scratch");
        fs::create_dir(&scratch_root).unwrap();

        let extracted = ArtifactExtractor::new("xgboost-model")
            .with_scratch_root(Some(scratch_root.clone()))
            .extract(&archive)
            .unwrap();
        let scratch = extracted.dir().to_path_buf();
        assert!(scratch.starts_with(&scratch_root));
        assert!(scratch.exists());

        drop(extracted);
        assert!(!scratch.exists());
    }

    #[test]
    fn test_missing_model_entry_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let archive = write_archive(dir.path(), &[("README", &b"not a model"[..])]);

        let err = ArtifactExtractor::new("xgboost-model")
            .extract(&archive)
            .unwrap_err();
        assert!(matches!(err, EvalError::ArtifactCorrupt { .. }));
        assert!(err.to_string().contains("xgboost-model"));
    }

    #[test]
    fn test_unopenable_archive_is_corrupt() {
        let err = ArtifactExtractor::new("xgboost-model")
            .extract("/nonexistent/model.tar.gz")
            .unwrap_err();
        assert!(matches!(err, EvalError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn test_truncated_gzip_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.tar.gz");
        fs::write(&path, [0x1f, 0x8b, 0x08, 0x00, 0x01]).unwrap();

        let err = ArtifactExtractor::new("xgboost-model")
            .extract(&path)
            .unwrap_err();
        assert!(matches!(err, EvalError::ArtifactCorrupt { .. }));
    }

    #[test]
    fn test_plain_tar_accepted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.tar");
        let mut builder = tar::Builder::new(File::create(&path).unwrap());
        let data = b"{}";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "xgboost-model", &data[..])
            .unwrap();
        builder.into_inner().unwrap();

        let extracted = ArtifactExtractor::new("xgboost-model")
            .extract(&path)
            .unwrap();
        assert!(extracted.model_path().is_file());
    }
}
