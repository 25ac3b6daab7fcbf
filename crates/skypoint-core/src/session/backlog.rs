// Project backlog: the list of stories estimated in this session.
//
// Held locally by each client; never synchronized.

use serde::{Deserialize, Serialize};

/// A work item being estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklogItem {
    pub id: u32,
    pub title: String,
    pub estimate_points: Option<f64>,
    pub is_completed: bool,
}

impl BacklogItem {
    fn new(id: u32, title: String) -> Self {
        BacklogItem {
            id,
            title,
            estimate_points: None,
            is_completed: false,
        }
    }

    /// The title, or `Story {id}` when untitled.
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            format!("Story {}", self.id)
        } else {
            self.title.clone()
        }
    }
}

/// Ordered backlog with a cursor on the item currently being estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backlog {
    items: Vec<BacklogItem>,
    current: usize,
    next_id: u32,
}

impl Default for Backlog {
    fn default() -> Self {
        Self::new()
    }
}

impl Backlog {
    /// A backlog holding a single untitled item.
    pub fn new() -> Self {
        Backlog {
            items: vec![BacklogItem::new(1, String::new())],
            current: 0,
            next_id: 2,
        }
    }

    pub fn items(&self) -> &[BacklogItem] {
        &self.items
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&BacklogItem> {
        self.items.get(self.current)
    }

    /// Title of the current item, used as the session story text.
    pub fn current_title(&self) -> &str {
        self.current().map(|i| i.title.as_str()).unwrap_or_default()
    }

    /// Append an item. Blank titles are ignored and return `None`.
    pub fn add(&mut self, title: &str) -> Option<u32> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(BacklogItem::new(id, title.to_string()));
        Some(id)
    }

    /// Move the cursor. Returns false for an out-of-range index.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Rename an item. Returns false when the id is unknown.
    pub fn edit(&mut self, id: u32, title: &str) -> bool {
        match self.items.iter_mut().find(|i| i.id == id) {
            Some(item) => {
                item.title = title.trim().to_string();
                true
            }
            None => false,
        }
    }

    /// Rename the current item.
    pub fn edit_current(&mut self, title: &str) -> bool {
        match self.items.get(self.current).map(|i| i.id) {
            Some(id) => self.edit(id, title),
            None => false,
        }
    }

    /// Delete an item. The last remaining item cannot be deleted.
    pub fn delete(&mut self, id: u32) -> bool {
        if self.items.len() <= 1 {
            return false;
        }
        let Some(index) = self.items.iter().position(|i| i.id == id) else {
            return false;
        };
        self.items.remove(index);
        if index < self.current || self.current >= self.items.len() {
            self.current = self.current.saturating_sub(1);
        }
        true
    }

    /// Record the agreed estimate on the current item and mark it done.
    pub fn complete_current(&mut self, points: f64) -> Option<&BacklogItem> {
        let item = self.items.get_mut(self.current)?;
        item.estimate_points = Some(points);
        item.is_completed = true;
        Some(item)
    }

    /// Sum of points over completed items.
    pub fn completed_points(&self) -> f64 {
        self.items
            .iter()
            .filter(|i| i.is_completed)
            .filter_map(|i| i.estimate_points)
            .sum()
    }
}
