//! Clip inputs handed over by the file-picking side.

use std::path::PathBuf;

use anyhow::{Context, Result};
use soundboard_types::AudioData;

/// Something that can be turned into a clip: a display name plus raw bytes.
pub trait ClipSource {
    /// Name the clip gets by default (usually the file name).
    fn file_name(&self) -> String;
    /// Read the raw audio bytes.
    fn read_bytes(&self) -> Result<Vec<u8>>;
}

impl<T: ClipSource + ?Sized> ClipSource for &T {
    fn file_name(&self) -> String {
        (**self).file_name()
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        (**self).read_bytes()
    }
}

/// Clip read from a file on disk.
#[derive(Clone, Debug)]
pub struct FileClipSource {
    path: PathBuf,
}

impl FileClipSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ClipSource for FileClipSource {
    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).with_context(|| format!("read {:?}", self.path))
    }
}

/// Clip whose bytes are already in memory.
#[derive(Clone, Debug)]
pub struct InMemoryClip {
    name: String,
    bytes: Vec<u8>,
}

impl InMemoryClip {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl ClipSource for InMemoryClip {
    fn file_name(&self) -> String {
        self.name.clone()
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

/// Read a source and convert it to its stored form.
pub fn encode_source(source: &impl ClipSource) -> Result<AudioData> {
    let name = source.file_name();
    let bytes = source.read_bytes()?;
    let data = AudioData::encode(&name, &bytes).with_context(|| format!("encode {name}"))?;
    Ok(data)
}
