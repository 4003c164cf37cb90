use std::{
    future::Future,
    path::{Path, PathBuf},
};

use tokio::process::Command;

use crate::{
    error::KinedlResult,
    key::DecryptionKey,
    util::process::{locate_tool, run_tool},
};

pub trait Decrypter {
    /// Decrypt the CENC-protected file at `input` into `output`.
    fn decrypt(
        &self,
        key: &DecryptionKey,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = KinedlResult<()>> + Send;
}

/// Bento4 `mp4decrypt`.
#[derive(Debug, Clone)]
pub struct Mp4Decrypt {
    path: PathBuf,
}

impl Mp4Decrypt {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Fails with `ToolNotFound` when the binary can not be found.
    pub fn locate(path: impl AsRef<Path>) -> KinedlResult<Self> {
        Ok(Self::new(locate_tool("mp4decrypt", path.as_ref())?))
    }
}

impl Decrypter for Mp4Decrypt {
    async fn decrypt(&self, key: &DecryptionKey, input: &Path, output: &Path) -> KinedlResult<()> {
        tracing::debug!("Decrypting {} with mp4decrypt", input.display());
        let mut command = Command::new(&self.path);
        command
            .arg("--key")
            .arg(format!("1:{}", key.to_hex()))
            .arg(input)
            .arg(output);
        run_tool("mp4decrypt", &self.path, &mut command).await
    }
}
