//! Open editor tabs

use serde::Serialize;
use uuid::Uuid;

use super::draft::RequestDraft;

/// Label shown for a tab whose request has no name
pub const UNTITLED_REQUEST: &str = "Untitled Request";

/// Tab identity: time-ordered, unique per process
pub type TabId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_label: Option<String>,
    #[serde(skip)]
    pub draft: RequestDraft,
}

impl Tab {
    pub fn new(label: &str, draft: RequestDraft) -> Self {
        Self {
            id: Uuid::now_v7(),
            label: label.to_string(),
            request_label: None,
            draft,
        }
    }
}

/// Ordered tabs plus the active selection.
///
/// The active id, when set, always names a tab in the set.
#[derive(Debug, Clone, Default)]
pub struct TabSet {
    tabs: Vec<Tab>,
    active: Option<TabId>,
}

impl TabSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `tab` unless one with the same id is open, then activate it
    pub fn open(&mut self, tab: Tab) -> TabId {
        let id = tab.id;
        if !self.contains(id) {
            self.tabs.push(tab);
        }
        self.active = Some(id);
        id
    }

    /// False when no tab has `id`
    pub fn activate(&mut self, id: TabId) -> bool {
        if self.contains(id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Remove a tab.
    ///
    /// Closing the active tab selects the last remaining one, or nothing
    /// when the set is empty. Closing any other tab keeps the selection.
    pub fn close(&mut self, id: TabId) -> Option<Tab> {
        let position = self.tabs.iter().position(|tab| tab.id == id)?;
        let closed = self.tabs.remove(position);
        if self.active == Some(id) {
            self.active = self.tabs.last().map(|tab| tab.id);
        }
        Some(closed)
    }

    pub fn rename(&mut self, id: TabId, label: &str) -> bool {
        match self.get_mut(id) {
            Some(tab) => {
                tab.label = label.to_string();
                true
            }
            None => false,
        }
    }

    /// Record the request name; the tab label follows it
    pub fn set_request_label(&mut self, id: TabId, request_label: &str) -> bool {
        match self.get_mut(id) {
            Some(tab) => {
                tab.request_label = Some(request_label.to_string());
                tab.label = if request_label.is_empty() {
                    UNTITLED_REQUEST.to_string()
                } else {
                    request_label.to_string()
                };
                true
            }
            None => false,
        }
    }

    /// Move the tab at `from` to `to`; out-of-range indices change nothing
    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        if from >= self.tabs.len() || to >= self.tabs.len() {
            return false;
        }
        let tab = self.tabs.remove(from);
        self.tabs.insert(to, tab);
        true
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.tabs.iter().any(|tab| tab.id == id)
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn get_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id == id)
    }

    pub fn active_id(&self) -> Option<TabId> {
        self.active
    }

    pub fn active(&self) -> Option<&Tab> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Tab> {
        let id = self.active?;
        self.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}
