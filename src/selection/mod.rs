use std::collections::HashSet;

use crate::model::RecordId;

/// Checkbox bookkeeping for the currently rendered page. Selection is
/// tied to the rows on screen: every render resets it, and select-all
/// covers exactly the visible page, never the full result set.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    visible: Vec<RecordId>,
    checked: HashSet<RecordId>,
    all_checked: bool,
}

impl Selection {
    /// Re-seeds the selection for a freshly rendered page. All prior
    /// state is dropped.
    pub fn sync(&mut self, visible: Vec<RecordId>) {
        self.visible = visible;
        self.checked.clear();
        self.all_checked = false;
    }

    pub fn toggle(&mut self, id: RecordId) -> bool {
        if !self.visible.contains(&id) {
            return false;
        }
        if self.checked.contains(&id) {
            self.checked.remove(&id);
            // one unticked row means the header no longer represents
            // "all selected"
            self.all_checked = false;
        } else {
            self.checked.insert(id);
            self.all_checked = self.checked.len() == self.visible.len();
        }
        true
    }

    pub fn toggle_all(&mut self, checked: bool) {
        self.checked.clear();
        if checked {
            self.checked.extend(self.visible.iter().copied());
        }
        self.all_checked = checked && !self.visible.is_empty();
    }

    pub fn is_selected(&self, id: RecordId) -> bool {
        self.checked.contains(&id)
    }

    /// Header checkbox state.
    pub fn all_checked(&self) -> bool {
        self.all_checked
    }

    pub fn count(&self) -> usize {
        self.checked.len()
    }

    /// Selected ids in render order.
    pub fn selected(&self) -> Vec<RecordId> {
        self.visible
            .iter()
            .copied()
            .filter(|id| self.checked.contains(id))
            .collect()
    }

    /// The bulk delete control is shown only while something is
    /// selected, and its label always carries the live count.
    pub fn bulk_button_visible(&self) -> bool {
        !self.checked.is_empty()
    }

    pub fn bulk_button_label(&self) -> String {
        format!("Delete Selected ({})", self.checked.len())
    }
}
