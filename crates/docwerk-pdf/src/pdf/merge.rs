// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF merger — concatenate the pages of several PDF documents using the
// `lopdf` crate.

use std::collections::HashMap;
use std::path::Path;

use docwerk_core::error::{DocwerkError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, instrument, warn};

use super::inherited_attribute;

/// Page attributes a page may inherit from the page tree instead of
/// carrying them itself.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Collects PDF documents and concatenates their pages in insertion order.
#[derive(Default)]
pub struct PdfMerger {
    documents: Vec<Document>,
}

impl PdfMerger {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Input ----------------------------------------------------------------

    /// Append a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let document = Document::load(path).map_err(|err| {
            DocwerkError::PdfError(format!("failed to open {}: {}", path.display(), err))
        })?;
        debug!(pages = document.get_pages().len(), "PDF queued for merge");
        self.documents.push(document);
        Ok(self)
    }

    /// Append a PDF already held in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn add_bytes(&mut self, data: &[u8]) -> Result<&mut Self> {
        let document = Document::load_mem(data).map_err(|err| {
            DocwerkError::PdfError(format!(
                "failed to load PDF #{} from memory: {}",
                self.documents.len() + 1,
                err
            ))
        })?;
        debug!(pages = document.get_pages().len(), "PDF queued for merge");
        self.documents.push(document);
        Ok(self)
    }

    /// Number of queued documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Total pages across every queued document.
    pub fn page_count(&self) -> usize {
        self.documents.iter().map(|doc| doc.get_pages().len()).sum()
    }

    // -- Output ---------------------------------------------------------------

    /// Concatenate every queued document into one PDF.
    ///
    /// The first document is taken as the base; the pages of every later
    /// document are appended with the objects they reference copied over.
    #[instrument(skip(self), fields(documents = self.documents.len()))]
    pub fn merge(&self) -> Result<Vec<u8>> {
        let (first, rest) = self
            .documents
            .split_first()
            .ok_or_else(|| DocwerkError::PdfError("nothing to merge".to_string()))?;

        info!(total_pages = self.page_count(), "Merging PDFs");

        let mut merged = first.clone();
        for source in rest {
            let mut cloner = ObjectCloner::new(source);
            for &page_id in source.get_pages().values() {
                cloner.append_page(&mut merged, page_id)?;
            }
        }

        let mut output = Vec::new();
        merged.save_to(&mut output).map_err(|err| {
            DocwerkError::PdfError(format!("failed to serialise merged PDF: {}", err))
        })?;

        debug!(output_bytes = output.len(), "Merge complete");
        Ok(output)
    }

    /// Merge and write the result to `path`.
    pub fn merge_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.merge()?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote merged PDF to {}", path.as_ref().display());
        Ok(())
    }
}

// -- Object cloning -----------------------------------------------------------

/// Copies objects from one source document into a target, remembering what
/// was already copied so shared resources are copied once and reference
/// cycles (annotations pointing back at their page) terminate.
struct ObjectCloner<'a> {
    source: &'a Document,
    mapped: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCloner<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            mapped: HashMap::new(),
        }
    }

    /// Copy page `page_id` into `target` and append it to the target's page
    /// tree root.
    fn append_page(&mut self, target: &mut Document, page_id: ObjectId) -> Result<()> {
        let source = self.source;
        let page = source.get_dictionary(page_id).map_err(|err| {
            DocwerkError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
        })?;

        // The page leaves its parent behind, so it must carry anything it
        // used to inherit.
        let mut flattened = page.clone();
        for key in INHERITABLE {
            if !flattened.has(key)
                && let Some(value) = inherited_attribute(source, page, key)
            {
                flattened.set(key.to_vec(), value.clone());
            }
        }

        let cloned_id = target.new_object_id();
        self.mapped.insert(page_id, cloned_id);
        let cloned = self.clone_dictionary(target, &flattened);
        target.objects.insert(cloned_id, Object::Dictionary(cloned));

        let pages_id = target
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|err| DocwerkError::PdfError(format!("no page tree root: {}", err)))?;

        if let Ok(pages_dict) = target.get_dictionary_mut(pages_id) {
            if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
                kids.push(Object::Reference(cloned_id));
            }
            if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
                *count += 1;
            }
        }

        if let Ok(page_dict) = target.get_dictionary_mut(cloned_id) {
            page_dict.set("Parent", Object::Reference(pages_id));
        }

        Ok(())
    }

    fn clone_reference(&mut self, target: &mut Document, id: ObjectId) -> Object {
        if let Some(&mapped) = self.mapped.get(&id) {
            return Object::Reference(mapped);
        }
        let Ok(referenced) = self.source.get_object(id) else {
            warn!(?id, "Cannot resolve reference, using Null");
            return Object::Null;
        };

        let new_id = target.new_object_id();
        self.mapped.insert(id, new_id);
        let cloned = self.clone_object(target, referenced);
        target.objects.insert(new_id, cloned);
        Object::Reference(new_id)
    }

    /// `/Parent` entries are dropped; the caller patches the page's own.
    fn clone_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut cloned = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            cloned.set(key.clone(), self.clone_object(target, value));
        }
        cloned
    }

    fn clone_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Dictionary(dict) => Object::Dictionary(self.clone_dictionary(target, dict)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.clone_object(target, item))
                    .collect(),
            ),
            Object::Reference(id) => self.clone_reference(target, *id),
            Object::Stream(stream) => {
                let mut cloned = stream.clone();
                cloned.dict = self.clone_dictionary(target, &stream.dict);
                Object::Stream(cloned)
            }
            other => other.clone(),
        }
    }
}
