use std::hash::Hash;

use indexmap::IndexMap;

/// Error type for local reorders
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReorderError {
    #[error("position {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
}

fn check(index: usize, len: usize) -> Result<(), ReorderError> {
    if index >= len {
        return Err(ReorderError::OutOfRange { index, len });
    }
    Ok(())
}

/// Take the item at `from` out and reinsert it at `to`. Items in between
/// shift by one. `from == to` leaves the list untouched.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<(), ReorderError> {
    check(from, items.len())?;
    check(to, items.len())?;
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    Ok(())
}

/// Same as [`move_item`] for an insertion-ordered map
pub fn move_entry<K: Hash + Eq, V>(
    map: &mut IndexMap<K, V>,
    from: usize,
    to: usize,
) -> Result<(), ReorderError> {
    check(from, map.len())?;
    check(to, map.len())?;
    if from != to {
        map.move_index(from, to);
    }
    Ok(())
}

/// [`move_entry`] over the sub-sequence of entries matching `keep`.
/// `from` and `to` count matching entries only; the other entries keep
/// their relative order.
pub fn move_entry_where<K: Hash + Eq, V>(
    map: &mut IndexMap<K, V>,
    keep: impl Fn(&V) -> bool,
    from: usize,
    to: usize,
) -> Result<(), ReorderError> {
    let slots: Vec<usize> = map
        .values()
        .enumerate()
        .filter(|(_, v)| keep(v))
        .map(|(i, _)| i)
        .collect();
    check(from, slots.len())?;
    check(to, slots.len())?;
    if from != to {
        map.move_index(slots[from], slots[to]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_forward_and_back() {
        let mut v = vec!['a', 'b', 'c', 'd'];
        move_item(&mut v, 0, 2).unwrap();
        assert_eq!(v, vec!['b', 'c', 'a', 'd']);
        move_item(&mut v, 2, 0).unwrap();
        assert_eq!(v, vec!['a', 'b', 'c', 'd']);
    }

    #[test]
    fn move_to_end() {
        let mut v = vec![1, 2, 3];
        move_item(&mut v, 0, 2).unwrap();
        assert_eq!(v, vec![2, 3, 1]);
    }

    #[test]
    fn same_index_is_noop() {
        let mut v = vec![1, 2, 3];
        move_item(&mut v, 1, 1).unwrap();
        assert_eq!(v, vec![1, 2, 3]);
    }

    #[test]
    fn out_of_range_is_rejected_without_change() {
        let mut v = vec![1, 2, 3];
        assert_eq!(
            move_item(&mut v, 3, 0),
            Err(ReorderError::OutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            move_item(&mut v, 0, 5),
            Err(ReorderError::OutOfRange { index: 5, len: 3 })
        );
        assert_eq!(v, vec![1, 2, 3]);

        let mut empty: Vec<u8> = Vec::new();
        assert!(move_item(&mut empty, 0, 0).is_err());
    }

    #[test]
    fn map_entries_follow_vec_semantics() {
        let mut map: IndexMap<&str, u8> = [("a", 1), ("b", 2), ("c", 3), ("d", 4)]
            .into_iter()
            .collect();
        let mut keys = vec!["a", "b", "c", "d"];
        for (from, to) in [(0, 3), (3, 1), (2, 2), (1, 0)] {
            move_entry(&mut map, from, to).unwrap();
            move_item(&mut keys, from, to).unwrap();
            assert_eq!(map.keys().copied().collect::<Vec<_>>(), keys);
        }
        assert_eq!(map["c"], 3);
    }

    #[test]
    fn filtered_moves_count_matching_entries_only() {
        let mut map: IndexMap<u8, char> = [(1, 'a'), (2, 'X'), (3, 'b'), (4, 'Y'), (5, 'c')]
            .into_iter()
            .collect();
        let lower = |c: &char| c.is_lowercase();

        move_entry_where(&mut map, lower, 0, 2).unwrap();
        let lows: Vec<char> = map.values().copied().filter(|c| lower(c)).collect();
        assert_eq!(lows, vec!['b', 'c', 'a']);
        let highs: Vec<char> = map.values().copied().filter(|c| !lower(c)).collect();
        assert_eq!(highs, vec!['X', 'Y']);

        move_entry_where(&mut map, lower, 2, 0).unwrap();
        let lows: Vec<char> = map.values().copied().filter(|c| lower(c)).collect();
        assert_eq!(lows, vec!['a', 'b', 'c']);

        assert_eq!(
            move_entry_where(&mut map, lower, 0, 3),
            Err(ReorderError::OutOfRange { index: 3, len: 3 })
        );
    }
}
