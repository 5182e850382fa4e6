//! Buffer view resolution.
//!
//! A [`BufferResolver`] turns a bufferView index into the exact byte slice it
//! covers. External buffer files are fetched through a [`BufferSource`] and
//! kept in a [`BufferCache`] owned by one import session, so a file referenced
//! by many views is read once.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use tracing::{debug, trace};

use crate::schema::{BufferView, Document};
use crate::status::{GltfError, Result};

/// Supplies the raw bytes behind a buffer URI.
pub trait BufferSource {
    fn load(&self, uri: &str) -> Result<Vec<u8>>;
}

impl<S: BufferSource + ?Sized> BufferSource for &S {
    fn load(&self, uri: &str) -> Result<Vec<u8>> {
        (**self).load(uri)
    }
}

/// In-memory buffer source, keyed by URI.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, uri: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(uri, data);
        self
    }

    pub fn insert(&mut self, uri: impl Into<String>, data: Vec<u8>) {
        self.files.insert(uri.into(), data);
    }
}

impl BufferSource for MemorySource {
    fn load(&self, uri: &str) -> Result<Vec<u8>> {
        self.files.get(uri).cloned().ok_or_else(|| GltfError::Io {
            path: PathBuf::from(uri),
            source: io::Error::new(io::ErrorKind::NotFound, "no such buffer"),
        })
    }
}

/// Loaded buffer contents keyed by URI.
#[derive(Debug, Default)]
pub struct BufferCache {
    entries: HashMap<String, Vec<u8>>,
}

impl BufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn get(&self, uri: &str) -> Option<&[u8]> {
        self.entries.get(uri).map(Vec::as_slice)
    }
}

/// Resolves buffer views of one document to byte slices.
pub struct BufferResolver<'d, S> {
    document: &'d Document,
    source: S,
    cache: BufferCache,
}

impl<'d, S: BufferSource> BufferResolver<'d, S> {
    /// Creates a resolver over `document`. `cache` may already hold buffers
    /// loaded earlier in the same session.
    pub fn new(document: &'d Document, source: S, cache: BufferCache) -> Self {
        Self {
            document,
            source,
            cache,
        }
    }

    pub fn document(&self) -> &'d Document {
        self.document
    }

    pub fn cache(&self) -> &BufferCache {
        &self.cache
    }

    /// Contents of buffer `index` up to its declared `byteLength`, loading it
    /// on first use.
    pub fn buffer(&mut self, index: usize) -> Result<&[u8]> {
        let buffer = self.document.buffer(index)?;
        let uri = match buffer.uri.as_deref() {
            None => return Err(GltfError::unsupported("embedded buffer")),
            Some(uri) if uri.starts_with("data:") => {
                return Err(GltfError::unsupported("embedded data URI"))
            }
            Some(uri) => uri,
        };

        if !self.cache.entries.contains_key(uri) {
            debug!(buffer = index, uri, "loading buffer");
            let data = self.source.load(uri)?;
            self.cache.entries.insert(uri.to_string(), data);
        } else {
            trace!(buffer = index, uri, "buffer cache hit");
        }

        let data = self
            .cache
            .entries
            .get(uri)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if data.len() < buffer.byte_length {
            return Err(GltfError::malformed(
                format!("buffers[{}]", index),
                format!(
                    "byteLength is {} but {} holds only {} bytes",
                    buffer.byte_length,
                    uri,
                    data.len()
                ),
            ));
        }
        Ok(&data[..buffer.byte_length])
    }

    /// Bytes covered by bufferView `index`.
    pub fn resolve(&mut self, index: usize) -> Result<&[u8]> {
        let document = self.document;
        let view = document.buffer_view(index)?;
        let data = self.buffer(view.buffer)?;
        view_slice(data, view, index)
    }

    /// Loads every buffer referenced by a buffer view. Returns the number of
    /// distinct files in the cache afterwards.
    pub fn preload(&mut self) -> Result<usize> {
        let document = self.document;
        let mut buffers: Vec<usize> = document.buffer_views.iter().map(|v| v.buffer).collect();
        buffers.sort_unstable();
        buffers.dedup();
        for index in buffers {
            self.buffer(index)?;
        }
        Ok(self.cache.len())
    }

    /// Ends the session's use of this resolver, handing back its cache.
    pub fn into_cache(self) -> BufferCache {
        self.cache
    }
}

fn view_slice<'a>(data: &'a [u8], view: &BufferView, index: usize) -> Result<&'a [u8]> {
    let start = view.byte_offset;
    let end = start
        .checked_add(view.byte_length)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| GltfError::AccessorOutOfBounds {
            entity: format!("bufferViews[{}]", index),
            start,
            end: start.saturating_add(view.byte_length),
            available: data.len(),
        })?;
    Ok(&data[start..end])
}
