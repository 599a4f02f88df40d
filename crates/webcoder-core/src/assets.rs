//! Process-lifetime cache of WASI toolchain assets.
//!
//! Compiler/interpreter binaries and base filesystem images are fetched from
//! the local asset bundle at most once. Initialization is single-flight:
//! concurrent first callers await the same load. A failed load leaves the
//! slot empty so the next request tries again. Nothing is ever evicted.

use crate::errors::ExecutionError;
use crate::vfs::FsSnapshot;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub const CLANG_WASM_PATH: &str = "wasm/clang.wasm";
pub const WASM_LD_WASM_PATH: &str = "wasm/wasm-ld.wasm";
pub const CLANG_BASE_FS_TAR_GZ_PATH: &str = "wasm/clang-fs.tar.gz";
pub const PYTHON_WASM_PATH: &str = "wasm/python-3.11.3.wasm";
pub const PYTHON_BASE_FS_TAR_GZ_PATH: &str = "wasm/python-3.11.3.tar.gz";

/// Where raw asset bytes come from.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, relative_path: &str) -> Result<Vec<u8>, ExecutionError>;
}

/// Reads assets from a directory laid out like the extension bundle.
#[derive(Debug, Clone)]
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetSource for DirAssetSource {
    async fn fetch(&self, relative_path: &str) -> Result<Vec<u8>, ExecutionError> {
        let path = self.root.join(relative_path);
        log::debug!("Loading asset {}", path.display());
        tokio::fs::read(&path)
            .await
            .map_err(|e| ExecutionError::AssetFetch {
                path: relative_path.to_string(),
                message: e.to_string(),
            })
    }
}

/// Cached immutable assets, keyed by the toolchain they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binary {
    Clang,
    WasmLd,
    Python,
}

impl Binary {
    pub fn asset_path(&self) -> &'static str {
        match self {
            Binary::Clang => CLANG_WASM_PATH,
            Binary::WasmLd => WASM_LD_WASM_PATH,
            Binary::Python => PYTHON_WASM_PATH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseImage {
    Clang,
    Python,
}

impl BaseImage {
    pub fn asset_path(&self) -> &'static str {
        match self {
            BaseImage::Clang => CLANG_BASE_FS_TAR_GZ_PATH,
            BaseImage::Python => PYTHON_BASE_FS_TAR_GZ_PATH,
        }
    }
}

pub struct AssetCache {
    source: Arc<dyn AssetSource>,
    clang: OnceCell<Arc<[u8]>>,
    wasm_ld: OnceCell<Arc<[u8]>>,
    python: OnceCell<Arc<[u8]>>,
    clang_fs: OnceCell<FsSnapshot>,
    python_fs: OnceCell<FsSnapshot>,
}

impl AssetCache {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self {
            source,
            clang: OnceCell::new(),
            wasm_ld: OnceCell::new(),
            python: OnceCell::new(),
            clang_fs: OnceCell::new(),
            python_fs: OnceCell::new(),
        }
    }

    fn binary_slot(&self, binary: Binary) -> &OnceCell<Arc<[u8]>> {
        match binary {
            Binary::Clang => &self.clang,
            Binary::WasmLd => &self.wasm_ld,
            Binary::Python => &self.python,
        }
    }

    fn image_slot(&self, image: BaseImage) -> &OnceCell<FsSnapshot> {
        match image {
            BaseImage::Clang => &self.clang_fs,
            BaseImage::Python => &self.python_fs,
        }
    }

    /// Module bytes for a toolchain binary. The bytes are shared and
    /// immutable, so handing out another reference is a copy in effect.
    pub async fn binary(&self, binary: Binary) -> Result<Arc<[u8]>, ExecutionError> {
        let bytes = self
            .binary_slot(binary)
            .get_or_try_init(|| async {
                let data = self.source.fetch(binary.asset_path()).await?;
                log::info!(
                    "Cached WASI binary {} ({} bytes)",
                    binary.asset_path(),
                    data.len()
                );
                Ok::<_, ExecutionError>(Arc::<[u8]>::from(data))
            })
            .await?;
        Ok(Arc::clone(bytes))
    }

    /// An owned copy of a base filesystem image, unpacked on first use.
    pub async fn base_fs(&self, image: BaseImage) -> Result<FsSnapshot, ExecutionError> {
        let snapshot = self
            .image_slot(image)
            .get_or_try_init(|| async {
                let path = image.asset_path();
                let data = self.source.fetch(path).await?;
                let snapshot = tokio::task::spawn_blocking(move || FsSnapshot::from_tar_gz(&data))
                    .await
                    .map_err(|e| ExecutionError::AssetDecode {
                        path: path.to_string(),
                        message: e.to_string(),
                    })?
                    .map_err(|e| ExecutionError::AssetDecode {
                        path: path.to_string(),
                        message: e.to_string(),
                    })?;
                log::info!("Cached base filesystem {} ({} files)", path, snapshot.len());
                Ok::<_, ExecutionError>(snapshot)
            })
            .await?;
        Ok(snapshot.clone())
    }
}
