//! Editing workspace: open tabs, their drafts and the saved requests
//!
//! [`Workspace`] owns the pieces and keeps them consistent; saving a tab
//! updates both the draft's snapshot and the saved request list.

pub mod draft;
pub mod saved;
pub mod tabs;

pub use draft::RequestDraft;
pub use saved::{RequestPatch, SavedRequests};
pub use tabs::{Tab, TabId, TabSet, UNTITLED_REQUEST};

use std::sync::{Arc, RwLock};

use crate::errors::{ReqdeckError, Result};
use crate::models::{EntityId, Request};
use crate::variables::VariableStore;

pub struct Workspace {
    tabs: TabSet,
    saved: SavedRequests,
    variables: Arc<RwLock<VariableStore>>,
}

impl Workspace {
    pub fn new(variables: Arc<RwLock<VariableStore>>) -> Self {
        Self {
            tabs: TabSet::new(),
            saved: SavedRequests::new(),
            variables,
        }
    }

    pub fn tabs(&self) -> &TabSet {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut TabSet {
        &mut self.tabs
    }

    pub fn saved(&self) -> &SavedRequests {
        &self.saved
    }

    pub fn saved_mut(&mut self) -> &mut SavedRequests {
        &mut self.saved
    }

    /// Shared with collection runners so variable edits reach the next send
    pub fn variables(&self) -> Arc<RwLock<VariableStore>> {
        Arc::clone(&self.variables)
    }

    /// Open an empty, unsaved request
    pub fn new_tab(&mut self) -> TabId {
        self.tabs.open(Tab::new(UNTITLED_REQUEST, RequestDraft::default()))
    }

    /// Open a tab editing the saved request `id`
    pub fn open_saved(&mut self, id: EntityId) -> Result<TabId> {
        let request = self
            .saved
            .get(id)
            .cloned()
            .ok_or_else(|| ReqdeckError::Argument(format!("No saved request with id {}", id)))?;
        let name = request.name.clone();
        let tab_id = self.tabs.open(Tab::new(&name, RequestDraft::from_saved(request)));
        self.tabs.set_request_label(tab_id, &name);
        Ok(tab_id)
    }

    /// Commit the tab's draft as `stored`, the request as the backend now has it
    pub fn save_tab(&mut self, tab_id: TabId, stored: Request) -> Result<()> {
        let tab = self
            .tabs
            .get_mut(tab_id)
            .ok_or_else(|| ReqdeckError::Argument(format!("No open tab {}", tab_id)))?;
        tab.draft.mark_saved(stored.clone());
        let name = stored.name.clone();
        self.saved.upsert(stored);
        self.tabs.set_request_label(tab_id, &name);
        Ok(())
    }

    /// Tabs with unsaved edits
    pub fn dirty_tabs(&self) -> Vec<TabId> {
        self.tabs
            .iter()
            .filter(|tab| tab.draft.is_dirty())
            .map(|tab| tab.id)
            .collect()
    }
}
