use std::fmt;
use std::sync::Arc;

/// Stable external identifier of an entity (ICAO address, airport ident, ...).
///
/// Cheap to clone: per-frame output carries ids for thousands of instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Arc<str>);

impl EntityId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Aircraft,
    Airport,
}

/// Kind-tagged reference to an entity in the store.
///
/// Ordering is `(kind, id)`, which gives every per-entity iteration in the
/// scene a deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn aircraft(id: impl Into<EntityId>) -> Self {
        Self {
            kind: EntityKind::Aircraft,
            id: id.into(),
        }
    }

    pub fn airport(id: impl Into<EntityId>) -> Self {
        Self {
            kind: EntityKind::Airport,
            id: id.into(),
        }
    }

    pub fn is_aircraft(&self) -> bool {
        matches!(self.kind, EntityKind::Aircraft)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntityKind::Aircraft => write!(f, "aircraft:{}", self.id),
            EntityKind::Airport => write!(f, "airport:{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, EntityRef};

    #[test]
    fn refs_order_by_kind_then_id() {
        let mut refs = vec![
            EntityRef::airport("KJFK"),
            EntityRef::aircraft("b"),
            EntityRef::aircraft("a"),
        ];
        refs.sort();
        assert_eq!(refs[0], EntityRef::aircraft("a"));
        assert_eq!(refs[1], EntityRef::aircraft("b"));
        assert_eq!(refs[2].kind, EntityKind::Airport);
    }

    #[test]
    fn display_is_tagged() {
        assert_eq!(EntityRef::aircraft("a1b2c3").to_string(), "aircraft:a1b2c3");
        assert_eq!(EntityRef::airport("EGLL").to_string(), "airport:EGLL");
    }
}
