use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: u64,
    pub title: String,
    pub body: String,
}

/// In-memory note storage shared by all requests of one application.
#[derive(Debug)]
pub struct NoteStore {
    notes: DashMap<u64, Note>,
    next_id: AtomicU64,
}

impl NoteStore {
    pub fn new() -> Self {
        Self {
            notes: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn insert(&self, title: String, body: String) -> Note {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let note = Note { id, title, body };
        self.notes.insert(id, note.clone());
        note
    }

    pub fn get(&self, id: u64) -> Option<Note> {
        self.notes.get(&id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: u64) -> Option<Note> {
        self.notes.remove(&id).map(|(_, note)| note)
    }

    /// All notes, oldest first.
    pub fn list(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.notes.iter().map(|entry| entry.value().clone()).collect();
        notes.sort_by_key(|note| note.id);
        notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

impl Default for NoteStore {
    fn default() -> Self {
        Self::new()
    }
}
