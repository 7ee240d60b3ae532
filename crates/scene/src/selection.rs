use crate::entity::EntityRef;

/// The user's current selected and hovered entities.
///
/// Owned by the session and read fresh at every use (snapshot merge,
/// lifecycle update, deload check), never captured ahead of time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Focus {
    pub selected: Option<EntityRef>,
    pub hovered: Option<EntityRef>,
}

impl Focus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, entity: &EntityRef) -> bool {
        self.selected.as_ref() == Some(entity)
    }

    pub fn is_hovered(&self, entity: &EntityRef) -> bool {
        self.hovered.as_ref() == Some(entity)
    }

    /// Selected or hovered entities are always drawn and never deloaded.
    pub fn is_focused(&self, entity: &EntityRef) -> bool {
        self.is_selected(entity) || self.is_hovered(entity)
    }

    /// Drop references to an entity that left the store.
    pub fn forget(&mut self, entity: &EntityRef) {
        if self.selected.as_ref() == Some(entity) {
            self.selected = None;
        }
        if self.hovered.as_ref() == Some(entity) {
            self.hovered = None;
        }
    }
}
