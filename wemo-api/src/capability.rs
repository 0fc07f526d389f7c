//! Capability ID/value codec used by bridge sub-devices.
//!
//! Bridges describe a sub-device as two comma-separated lists, one of
//! capability IDs and one of values, matched up by position:
//!
//! ```text
//! CapabilityIDs: 10006,10008,30008,30009,3000A
//! CurrentState:  1,255:0,,,
//! ```

/// Ordered mapping of capability IDs to values.
///
/// Iteration order is insertion order. Some write actions are positional, so
/// [`to_csv_pair`](Self::to_csv_pair) must reproduce the order the map was
/// built in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityMap {
    entries: Vec<(String, String)>,
}

impl CapabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zip an ID list and a value list by index.
    ///
    /// When the lists differ in length only the shorter length's worth of
    /// pairs is produced; unmatched trailing entries are dropped. An empty ID
    /// list yields an empty map.
    pub fn from_csv(ids: &str, values: &str) -> Self {
        let mut map = Self::new();
        if ids.is_empty() {
            return map;
        }
        for (id, value) in ids.split(',').zip(values.split(',')) {
            map.insert(id, value);
        }
        map
    }

    /// Inverse of [`from_csv`](Self::from_csv): `(ids, values)` in map order.
    pub fn to_csv_pair(&self) -> (String, String) {
        let ids = self
            .entries
            .iter()
            .map(|(id, _)| id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let values = self
            .entries
            .iter()
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join(",");
        (ids, values)
    }

    /// Insert or overwrite. An existing ID keeps its original position.
    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<String>) {
        let id = id.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((id, value)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(id, value)| (id.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CapabilityMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (id, value) in iter {
            map.insert(id, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_csv_zips_by_index() {
        let map = CapabilityMap::from_csv("10006,10008,30008,30009,3000A", "1,255:0,,,");
        assert_eq!(map.len(), 5);
        assert_eq!(map.get("10006"), Some("1"));
        assert_eq!(map.get("10008"), Some("255:0"));
        assert_eq!(map.get("3000A"), Some(""));
    }

    #[test]
    fn test_from_csv_drops_unmatched_tail() {
        let map = CapabilityMap::from_csv("10006,10008,10300", "0,128:0");
        assert_eq!(map.len(), 2);
        assert!(!map.contains("10300"));

        let map = CapabilityMap::from_csv("10006", "1,2,3");
        assert_eq!(map.to_csv_pair(), ("10006".to_string(), "1".to_string()));
    }

    #[test]
    fn test_empty_ids() {
        assert!(CapabilityMap::from_csv("", "").is_empty());
    }

    #[test]
    fn test_insert_keeps_position() {
        let mut map: CapabilityMap = [("10006", "1"), ("10008", "128:0")].into_iter().collect();
        map.insert("10006", "0");
        map.insert("10300", "45968:17936:0");
        assert_eq!(
            map.to_csv_pair(),
            (
                "10006,10008,10300".to_string(),
                "0,128:0,45968:17936:0".to_string()
            )
        );
    }

    fn equal_length_lists() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
        proptest::collection::hash_set("[0-9A-F]{5}", 0..12).prop_flat_map(|ids| {
            let ids: Vec<String> = ids.into_iter().collect();
            let len = ids.len();
            (
                Just(ids),
                proptest::collection::vec("[0-9:]{0,8}", len..=len),
            )
        })
    }

    proptest! {
        #[test]
        fn prop_round_trip_equal_length_lists((ids, values) in equal_length_lists()) {
            let ids_csv = ids.join(",");
            let values_csv = values.join(",");

            let map = CapabilityMap::from_csv(&ids_csv, &values_csv);
            let (ids_back, values_back) = map.to_csv_pair();

            prop_assert_eq!(ids_back, ids_csv);
            prop_assert_eq!(values_back, values_csv);
        }
    }
}
