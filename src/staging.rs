//! Pre-queue staging area for editable drafts.
//!
//! Staged items exist only until promoted into tasks: promotion copies their
//! content into new task records and drains the staged list. The scheduler
//! never sees staged items — they are its input boundary, nothing more.

use serde::{Deserialize, Serialize};

/// An editable text prompt draft
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StagedText {
    /// Staging-local identifier (not a task id)
    pub id: u64,

    /// Draft prompt text (may be empty until filled)
    pub prompt: String,
}

/// An editable draft derived from a loaded image file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StagedFile {
    /// Staging-local identifier (not a task id)
    pub id: u64,

    /// Source filename, carried through to the task for export naming
    pub original_filename: String,

    /// Encoded image payload; `None` until the caller finishes encoding.
    /// Files without a ready payload are not promoted.
    pub payload: Option<String>,

    /// Draft prompt text (defaults to a placeholder at promotion if empty)
    pub prompt: String,
}

/// Holds staged drafts until they are promoted into the task queue
#[derive(Debug, Default)]
pub struct StagingArea {
    texts: Vec<StagedText>,
    files: Vec<StagedFile>,
    next_id: u64,
}

impl StagingArea {
    /// Create an empty staging area
    pub fn new() -> Self {
        Self::default()
    }

    /// Staged text drafts, in order
    pub fn texts(&self) -> &[StagedText] {
        &self.texts
    }

    /// Staged file drafts, in order
    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    /// Replace the staged text list with `count` empty slots (min 1)
    pub fn generate_text_slots(&mut self, count: usize) {
        let count = count.max(1);
        self.texts = (0..count)
            .map(|_| StagedText {
                id: self.take_id(),
                prompt: String::new(),
            })
            .collect();
    }

    /// Stage a loaded image file, returning its staging id
    pub fn add_file(&mut self, original_filename: impl Into<String>, payload: Option<String>) -> u64 {
        let id = self.take_id();
        self.files.push(StagedFile {
            id,
            original_filename: original_filename.into(),
            payload,
            prompt: String::new(),
        });
        id
    }

    /// Attach the encoded payload once the caller finishes encoding.
    /// Returns false if the staging id no longer exists.
    pub fn set_file_payload(&mut self, id: u64, payload: String) -> bool {
        match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) => {
                file.payload = Some(payload);
                true
            }
            None => false,
        }
    }

    /// Edit one staged text prompt. Returns false if the id no longer exists.
    pub fn set_text_prompt(&mut self, id: u64, prompt: impl Into<String>) -> bool {
        match self.texts.iter_mut().find(|t| t.id == id) {
            Some(text) => {
                text.prompt = prompt.into();
                true
            }
            None => false,
        }
    }

    /// Edit one staged file prompt. Returns false if the id no longer exists.
    pub fn set_file_prompt(&mut self, id: u64, prompt: impl Into<String>) -> bool {
        match self.files.iter_mut().find(|f| f.id == id) {
            Some(file) => {
                file.prompt = prompt.into();
                true
            }
            None => false,
        }
    }

    /// Fill staged text prompts with a global prompt.
    ///
    /// With `overwrite` false only blank prompts are filled; with `overwrite`
    /// true every prompt is replaced. Returns how many prompts changed.
    pub fn fill_texts(&mut self, global_prompt: &str, overwrite: bool) -> usize {
        Self::fill(
            self.texts.iter_mut().map(|t| &mut t.prompt),
            global_prompt,
            overwrite,
        )
    }

    /// Fill staged file prompts with a global prompt (same rules as
    /// [`fill_texts`](Self::fill_texts))
    pub fn fill_files(&mut self, global_prompt: &str, overwrite: bool) -> usize {
        Self::fill(
            self.files.iter_mut().map(|f| &mut f.prompt),
            global_prompt,
            overwrite,
        )
    }

    /// Drain all staged texts for promotion
    pub fn take_texts(&mut self) -> Vec<StagedText> {
        std::mem::take(&mut self.texts)
    }

    /// Drain the staged files for promotion, returning only those with a
    /// ready payload. The staged list is cleared entirely either way.
    pub fn take_ready_files(&mut self) -> Vec<StagedFile> {
        std::mem::take(&mut self.files)
            .into_iter()
            .filter(|f| f.payload.is_some())
            .collect()
    }

    /// Discard all staged texts
    pub fn clear_texts(&mut self) {
        self.texts.clear();
    }

    /// Discard all staged files
    pub fn clear_files(&mut self) {
        self.files.clear();
    }

    fn fill<'a>(
        prompts: impl Iterator<Item = &'a mut String>,
        global_prompt: &str,
        overwrite: bool,
    ) -> usize {
        if global_prompt.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for prompt in prompts {
            if overwrite || prompt.trim().is_empty() {
                *prompt = global_prompt.to_string();
                changed += 1;
            }
        }
        changed
    }

    fn take_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}
