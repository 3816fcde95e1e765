use super::*;

// ============================================================================
// Increment / decrement tests
// ============================================================================

#[test]
fn test_new_is_empty() {
    let map: RefCountMap<u32> = RefCountMap::new();
    assert!(map.is_empty());
    assert_eq!(map.count(7), 0);
}

#[test]
fn test_increment_counts_per_key() {
    let mut map = RefCountMap::new();
    assert_eq!(map.increment(1u32), 1);
    assert_eq!(map.increment(1), 2);
    assert_eq!(map.increment(2), 1);

    // Two distinct keys, three references
    assert_eq!(map.len(), 2);
    assert_eq!(map.count(1), 2);
}

#[test]
fn test_decrement_removes_at_zero() {
    let mut map = RefCountMap::new();
    map.increment(5u32);
    map.increment(5);

    assert_eq!(map.decrement(5), Some(1));
    assert!(map.contains(5));
    assert_eq!(map.decrement(5), Some(0));
    assert!(!map.contains(5));
    assert!(map.is_empty());
}

#[test]
fn test_decrement_missing_key() {
    let mut map: RefCountMap<u32> = RefCountMap::new();
    assert_eq!(map.decrement(3), None);
    assert!(map.is_empty());
}

// ============================================================================
// Bulk removal tests
// ============================================================================

#[test]
fn test_remove_drops_all_references() {
    let mut map = RefCountMap::new();
    map.increment(9u32);
    map.increment(9);
    map.increment(9);

    assert_eq!(map.remove(9), 3);
    assert_eq!(map.remove(9), 0);
    assert_eq!(map.count(9), 0);
}

#[test]
fn test_drain_keys() {
    let mut map = RefCountMap::new();
    map.increment(1u32);
    map.increment(2);
    map.increment(2);

    let mut keys = map.drain_keys();
    keys.sort();
    assert_eq!(keys, vec![1, 2]);
    assert!(map.is_empty());
}
