// Name → IR type lookup, sorted for binary search

use crate::types::IrTypeId;

#[derive(Debug, Default)]
pub struct TypeMap {
    entries: Vec<(String, IrTypeId)>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named type. Re-registration of the same name keeps
    /// the first binding.
    pub fn insert(&mut self, name: impl Into<String>, ty: IrTypeId) {
        let name = name.into();
        match self.entries.binary_search_by(|(key, _)| key.as_str().cmp(&name)) {
            Ok(_) => {}
            Err(position) => self.entries.insert(position, (name, ty)),
        }
    }

    pub fn find(&self, name: &str) -> Option<IrTypeId> {
        self.entries
            .binary_search_by(|(key, _)| key.as_str().cmp(name))
            .ok()
            .map(|position| self.entries[position].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_find() {
        let mut map = TypeMap::new();
        map.insert("int", IrTypeId(4));
        map.insert("ubyte", IrTypeId(1));

        assert_eq!(map.find("int"), Some(IrTypeId(4)));
        assert_eq!(map.find("ubyte"), Some(IrTypeId(1)));
        assert_eq!(map.find("missing"), None);
    }

    #[test]
    fn test_first_binding_wins() {
        let mut map = TypeMap::new();
        map.insert("T", IrTypeId(1));
        map.insert("T", IrTypeId(2));
        assert_eq!(map.find("T"), Some(IrTypeId(1)));
        assert_eq!(map.len(), 1);
    }
}
