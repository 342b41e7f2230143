//! Bulk reorder input

use serde::Deserialize;
use std::collections::BTreeMap;

/// Client-submitted mapping of row id (as a JSON object key) to new order
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct OrderMap(pub BTreeMap<String, i32>);

/// A single order assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderItem {
    pub id: i64,
    pub sort_order: i32,
}

impl OrderMap {
    /// Assignments with a numeric id. Entries whose key is not an id are dropped.
    pub fn items(&self) -> Vec<OrderItem> {
        self.0
            .iter()
            .filter_map(|(id, order)| {
                id.trim().parse().ok().map(|id| OrderItem {
                    id,
                    sort_order: *order,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parses_json_object() {
        let map: OrderMap = serde_json::from_str(r#"{"5": 2, "6": 1}"#).unwrap();
        let mut items = map.items();
        items.sort_by_key(|i| i.id);
        assert_eq!(
            items,
            vec![
                OrderItem { id: 5, sort_order: 2 },
                OrderItem { id: 6, sort_order: 1 },
            ]
        );
    }

    #[test]
    fn test_skips_non_numeric_ids() {
        let map: OrderMap = serde_json::from_str(r#"{"abc": 1, "": 2, "7": 3}"#).unwrap();
        assert_eq!(map.items(), vec![OrderItem { id: 7, sort_order: 3 }]);
    }

    #[test]
    fn test_rejects_non_integer_order() {
        assert!(serde_json::from_str::<OrderMap>(r#"{"1": "first"}"#).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn property_numeric_keys_survive(entries in proptest::collection::btree_map(0i64..10_000, any::<i32>(), 0..20)) {
            let map = OrderMap(entries.iter().map(|(id, order)| (id.to_string(), *order)).collect());
            let items = map.items();
            prop_assert_eq!(items.len(), entries.len());
            for item in items {
                prop_assert_eq!(entries.get(&item.id), Some(&item.sort_order));
            }
        }
    }
}
