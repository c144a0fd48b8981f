//! Document Store
//!
//! Authoritative in-memory text of every document the session has seen. Closing
//! a document only hides it from the open set; its content stays available for
//! whole-program compilation.

use std::cell::OnceCell;

use indexmap::IndexMap;
use tower_lsp::lsp_types::{Range, Url};
use tracing::debug;

use crate::vfs::error::StoreError;
use crate::vfs::line_index::LineIndex;

/// A single content update reported by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentChange {
    /// The whole document was replaced
    FullReplace(String),
    /// `range` was replaced by `text`
    RangeReplace { range: Range, text: String },
    /// Only the version moved
    VersionOnly,
}

#[derive(Debug, Clone)]
pub struct TrackedDocument {
    uri: Url,
    language_id: String,
    version: Option<i32>,
    content: String,
    open: bool,
    revision: u64,
    line_index: OnceCell<LineIndex>,
}

impl TrackedDocument {
    fn new(uri: Url, language_id: String, version: i32, content: String, revision: u64) -> Self {
        Self {
            uri,
            language_id,
            version: Some(version),
            content,
            open: true,
            revision,
            line_index: OnceCell::new(),
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    /// Client-supplied version, `None` if the client never sent one
    pub fn version(&self) -> Option<i32> {
        self.version
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Internal counter advanced by every mutation, independent of client versions
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Line-start index of the current content, built on first use
    pub fn line_index(&self) -> &LineIndex {
        self.line_index.get_or_init(|| LineIndex::new(&self.content))
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
        self.line_index = OnceCell::new();
    }

    fn check_version(&self, version: Option<i32>) -> Result<(), StoreError> {
        match (self.version, version) {
            (Some(current), Some(received)) if received < current => Err(StoreError::StaleVersion {
                uri: self.uri.clone(),
                current,
                received,
            }),
            _ => Ok(()),
        }
    }

    fn commit(&mut self, version: Option<i32>) {
        if version.is_some() {
            self.version = version;
        }
        self.revision += 1;
    }
}

/// In-memory map from document URI to tracked content
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: IndexMap<Url, TrackedDocument>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a document and marks it open
    pub fn open(&mut self, uri: Url, language_id: String, version: i32, content: String) {
        let revision = match self.documents.get(&uri) {
            Some(previous) => {
                debug!("Re-opening {} (open: {})", uri, previous.open);
                previous.revision + 1
            }
            None => 0,
        };

        let document = TrackedDocument::new(uri.clone(), language_id, version, content, revision);
        self.documents.insert(uri, document);
    }

    /// Replaces the whole content of an open document
    pub fn replace_all(
        &mut self,
        uri: &Url,
        version: Option<i32>,
        content: String,
    ) -> Result<(), StoreError> {
        let document = self.open_document_mut(uri)?;
        document.check_version(version)?;
        document.set_content(content);
        document.commit(version);
        Ok(())
    }

    /// Replaces `range` of an open document with `text`
    pub fn replace_range(
        &mut self,
        uri: &Url,
        version: Option<i32>,
        range: Range,
        text: &str,
    ) -> Result<(), StoreError> {
        let document = self.open_document_mut(uri)?;
        document.check_version(version)?;

        let (start, end) = document
            .line_index()
            .span(&document.content, range)
            .ok_or_else(|| StoreError::InvalidRange {
                uri: uri.clone(),
                range,
            })?;

        let mut content = String::with_capacity(document.content.len() - (end - start) + text.len());
        content.push_str(&document.content[..start]);
        content.push_str(text);
        content.push_str(&document.content[end..]);

        document.set_content(content);
        document.commit(version);
        Ok(())
    }

    /// Advances the version of an open document without touching its content
    pub fn bump_version(&mut self, uri: &Url, version: Option<i32>) -> Result<(), StoreError> {
        let document = self.open_document_mut(uri)?;
        document.check_version(version)?;
        document.commit(version);
        Ok(())
    }

    /// Applies one client change
    pub fn apply(
        &mut self,
        uri: &Url,
        version: Option<i32>,
        change: DocumentChange,
    ) -> Result<(), StoreError> {
        match change {
            DocumentChange::FullReplace(content) => self.replace_all(uri, version, content),
            DocumentChange::RangeReplace { range, text } => {
                self.replace_range(uri, version, range, &text)
            }
            DocumentChange::VersionOnly => self.bump_version(uri, version),
        }
    }

    /// Removes a document from the open set. Its content is retained.
    pub fn close(&mut self, uri: &Url) -> Result<(), StoreError> {
        let document = self.open_document_mut(uri)?;
        document.open = false;
        Ok(())
    }

    pub fn get(&self, uri: &Url) -> Option<&TrackedDocument> {
        self.documents.get(uri)
    }

    /// Like [`DocumentStore::get`], failing for unknown documents
    pub fn require(&self, uri: &Url) -> Result<&TrackedDocument, StoreError> {
        self.get(uri)
            .ok_or_else(|| StoreError::UnknownDocument(uri.clone()))
    }

    pub fn is_open(&self, uri: &Url) -> bool {
        self.get(uri).is_some_and(TrackedDocument::is_open)
    }

    /// Every tracked document, open or retained, in first-seen order
    pub fn documents(&self) -> impl Iterator<Item = &TrackedDocument> {
        self.documents.values()
    }

    pub fn open_documents(&self) -> impl Iterator<Item = &TrackedDocument> {
        self.documents().filter(|document| document.open)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn open_document_mut(&mut self, uri: &Url) -> Result<&mut TrackedDocument, StoreError> {
        let document = self
            .documents
            .get_mut(uri)
            .ok_or_else(|| StoreError::UnknownDocument(uri.clone()))?;

        if !document.open {
            return Err(StoreError::NotOpen(uri.clone()));
        }

        Ok(document)
    }
}
