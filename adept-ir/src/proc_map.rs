// Procedure map
// Maps generic keys to sorted lists of function endpoints. The key
// array is kept sorted in lock-step with the endpoint-list array so
// lookup is a cache-friendly binary search.

use crate::endpoint::{endpoint_list_insert, FuncEndpoint};

/// Key for plain function lookup
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FuncKey {
    pub name: String,
}

impl FuncKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Key for method lookup.
/// Methods are grouped ignoring polymorphic parameters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MethodKey {
    pub struct_name: String,
    pub method_name: String,
}

impl MethodKey {
    pub fn new(struct_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            struct_name: struct_name.into(),
            method_name: method_name.into(),
        }
    }
}

#[derive(Debug)]
pub struct ProcMap<K: Ord> {
    keys: Vec<K>,
    endpoint_lists: Vec<Vec<FuncEndpoint>>,
}

impl<K: Ord> Default for ProcMap<K> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            endpoint_lists: Vec::new(),
        }
    }
}

impl<K: Ord> ProcMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an endpoint into the list for `key`, creating the key if
    /// it does not exist yet
    pub fn insert(&mut self, key: K, endpoint: FuncEndpoint) {
        match self.keys.binary_search(&key) {
            Ok(position) => {
                endpoint_list_insert(&mut self.endpoint_lists[position], endpoint);
            }
            Err(position) => {
                self.keys.insert(position, key);
                self.endpoint_lists.insert(position, vec![endpoint]);
            }
        }
    }

    /// Endpoint list for a key, or `None` when the key is absent
    pub fn find(&self, key: &K) -> Option<&[FuncEndpoint]> {
        let position = self.keys.binary_search(key).ok()?;
        Some(&self.endpoint_lists[position])
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &[FuncEndpoint])> {
        self.keys
            .iter()
            .zip(self.endpoint_lists.iter().map(Vec::as_slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_find() {
        let mut map: ProcMap<FuncKey> = ProcMap::new();
        map.insert(FuncKey::new("print"), FuncEndpoint::concrete(0, 0));
        map.insert(FuncKey::new("main"), FuncEndpoint::concrete(1, 1));
        map.insert(FuncKey::new("print"), FuncEndpoint::concrete(2, 2));

        let print_list = map.find(&FuncKey::new("print")).expect("print exists");
        assert_eq!(print_list.len(), 2);
        assert!(map.find(&FuncKey::new("missing")).is_none());
    }

    #[test]
    fn test_endpoint_lists_stay_sorted() {
        let mut map: ProcMap<FuncKey> = ProcMap::new();
        map.insert(FuncKey::new("f"), FuncEndpoint::polymorphic(0));
        map.insert(FuncKey::new("f"), FuncEndpoint::concrete(3, 9));
        map.insert(FuncKey::new("f"), FuncEndpoint::concrete(1, 4));

        let list = map.find(&FuncKey::new("f")).expect("f exists");
        assert_eq!(list[0].ast_func_id, 1);
        assert_eq!(list[1].ast_func_id, 3);
        assert!(list[2].is_polymorphic());
    }

    #[test]
    fn test_method_keys_compare_by_both_names() {
        let mut map: ProcMap<MethodKey> = ProcMap::new();
        map.insert(MethodKey::new("Shape", "area"), FuncEndpoint::concrete(0, 0));
        map.insert(MethodKey::new("Circle", "area"), FuncEndpoint::concrete(1, 1));

        assert!(map.find(&MethodKey::new("Shape", "area")).is_some());
        assert!(map.find(&MethodKey::new("Shape", "perimeter")).is_none());
        assert_eq!(map.len(), 2);
    }
}
