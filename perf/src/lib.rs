use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vigil_cnc::{CncError, CncFile, ControlLayout, Handshake};

pub const BENCH_FILENAME: &str = "cnc.dat";
pub const BENCH_FILE_LENGTH: usize = 4096;

/// Owner handle over a fresh cnc file in its own temp directory.
/// The directory is removed when the scratch is dropped.
pub struct ScratchCnc {
    pub cnc: CncFile,
    pub handshake: Handshake,
    dir: TempDir,
}

#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    #[error("failed to create bench directory")]
    TempDir(#[from] io::Error),

    #[error(transparent)]
    Cnc(#[from] CncError),
}

impl ScratchCnc {
    pub fn new(label: &str, handshake: Handshake) -> Result<Self, ScratchError> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("vigil_bench_{label}_"))
            .tempdir()?;
        let cnc = handshake.create_in_directory(
            cnc_dir(dir.path()),
            BENCH_FILENAME,
            BENCH_FILE_LENGTH,
            false,
        )?;
        Ok(Self {
            cnc,
            handshake,
            dir,
        })
    }

    pub fn cnc_dir(&self) -> PathBuf {
        cnc_dir(self.dir.path())
    }

    pub fn path(&self) -> PathBuf {
        self.cnc_dir().join(BENCH_FILENAME)
    }
}

fn cnc_dir(root: &Path) -> PathBuf {
    root.join("cnc")
}

/// Version at offset 0, timestamp at offset 8.
pub fn default_handshake() -> Result<Handshake, CncError> {
    Ok(Handshake::new(ControlLayout::new(0, 8)?))
}
