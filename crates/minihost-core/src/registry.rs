//! Plugin format registry.
//!
//! Formats (VST3, AU, LV2, ...) implement [`PluginFormat`] and are registered
//! explicitly. Opening a path asks each format in registration order whether
//! it recognizes the path and hands it to the first one that does.

use crate::backend::PluginBackend;
use crate::{Error, LoadStage, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Host-side settings for opening a plugin.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenOptions {
    pub sample_rate: f64,
    pub max_block_size: usize,
    /// `None` keeps the plugin's default layout.
    pub input_channels: Option<usize>,
    pub output_channels: Option<usize>,
    /// Sidechain inputs to request. 0 disables the sidechain bus.
    pub sidechain_channels: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            max_block_size: 512,
            input_channels: None,
            output_channels: None,
            sidechain_channels: 0,
        }
    }
}

impl OpenOptions {
    pub fn new(sample_rate: f64, max_block_size: usize) -> Self {
        Self {
            sample_rate,
            max_block_size,
            ..Default::default()
        }
    }

    pub fn channels(mut self, inputs: usize, outputs: usize) -> Self {
        self.input_channels = Some(inputs);
        self.output_channels = Some(outputs);
        self
    }

    pub fn sidechain(mut self, channels: usize) -> Self {
        self.sidechain_channels = channels;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.max_block_size == 0 {
            return Err(Error::InvalidConfig(
                "max block size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// One plugin format's loader.
pub trait PluginFormat: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap check on the path alone (extension, bundle layout).
    fn can_open(&self, path: &Path) -> bool;

    fn open(&self, path: &Path, options: &OpenOptions) -> Result<Arc<dyn PluginBackend>>;
}

#[derive(Default)]
pub struct FormatRegistry {
    formats: Vec<Box<dyn PluginFormat>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, format: impl PluginFormat + 'static) -> &mut Self {
        tracing::debug!("Registered plugin format: {}", format.name());
        self.formats.push(Box::new(format));
        self
    }

    pub fn with_format(mut self, format: impl PluginFormat + 'static) -> Self {
        self.register(format);
        self
    }

    pub fn format_names(&self) -> impl Iterator<Item = &str> {
        self.formats.iter().map(|f| f.name())
    }

    /// First registered format that recognizes `path`.
    pub fn resolve(&self, path: &Path) -> Option<&dyn PluginFormat> {
        self.formats
            .iter()
            .find(|f| f.can_open(path))
            .map(|f| &**f)
    }

    pub fn open<P: AsRef<Path>>(
        &self,
        path: P,
        options: &OpenOptions,
    ) -> Result<Arc<dyn PluginBackend>> {
        let path = path.as_ref();
        options.validate()?;

        if !path.exists() {
            return Err(Error::LoadFailed {
                path: path.to_path_buf(),
                stage: LoadStage::Probing,
                reason: "path does not exist".into(),
            });
        }

        let format = self
            .resolve(path)
            .ok_or_else(|| Error::UnknownFormat(path.to_path_buf()))?;

        match format.open(path, options) {
            Ok(backend) => {
                let info = backend.info();
                tracing::info!(
                    "Opened {} plugin {} ({} in + {} sidechain / {} out, {} params, {} samples latency)",
                    format.name(),
                    path.display(),
                    info.input_channels,
                    info.sidechain_channels,
                    info.output_channels,
                    info.num_params,
                    info.latency_samples
                );
                Ok(backend)
            }
            Err(e) => {
                tracing::warn!("Failed to open {}: {}", path.display(), e);
                Err(e)
            }
        }
    }

    /// Paths directly inside `dir` that some registered format recognizes.
    pub fn scan_directory<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if self.resolve(&path).is_some() {
                found.push(path);
            }
        }
        found.sort();
        tracing::debug!("Found {} plugins in {}", found.len(), dir.display());
        Ok(found)
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.format_names()).finish()
    }
}
