//! Round-robin partitioning of work items into groups.

/// Split `items` into at most `group_count` groups, round-robin.
///
/// `group_count` is clamped to `items.len()`. Items are read in blocks of
/// `group_count`; the k-th item of each block goes to group k. Every item
/// lands in exactly one group, relative order is kept within a group, and
/// group sizes differ by at most one (earlier groups are never smaller).
///
/// Returns an empty vector when there are no items or `group_count` is 0.
pub fn partition<T: Clone>(items: &[T], group_count: usize) -> Vec<Vec<T>> {
    if items.is_empty() || group_count == 0 {
        return Vec::new();
    }

    let group_count = group_count.min(items.len());
    let mut groups: Vec<Vec<T>> = (0..group_count)
        .map(|_| Vec::with_capacity(items.len().div_ceil(group_count)))
        .collect();

    for block in items.chunks(group_count) {
        for (k, item) in block.iter().enumerate() {
            groups[k].push(item.clone());
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_robin_placement() {
        let items: Vec<u32> = (1..=10).collect();
        let groups = partition(&items, 3);
        assert_eq!(
            groups,
            vec![vec![1, 4, 7, 10], vec![2, 5, 8], vec![3, 6, 9]]
        );
    }

    #[test]
    fn test_group_sizes_balanced() {
        for len in 1..40usize {
            for count in 1..12usize {
                let items: Vec<usize> = (0..len).collect();
                let groups = partition(&items, count);

                assert_eq!(groups.len(), count.min(len));
                let total: usize = groups.iter().map(Vec::len).sum();
                assert_eq!(total, len);

                let max = groups.iter().map(Vec::len).max().unwrap();
                let min = groups.iter().map(Vec::len).min().unwrap();
                assert!(max - min <= 1, "len={len} count={count}");
                assert!(groups.windows(2).all(|w| w[0].len() >= w[1].len()));

                let mut flat: Vec<usize> = groups.iter().flatten().copied().collect();
                flat.sort();
                assert_eq!(flat, items);
                for g in &groups {
                    assert!(g.windows(2).all(|w| w[0] < w[1]));
                }
            }
        }
    }

    #[test]
    fn test_more_groups_than_items() {
        let groups = partition(&["a", "b"], 8);
        assert_eq!(groups, vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn test_empty_input() {
        assert!(partition::<u8>(&[], 4).is_empty());
        assert!(partition(&[1, 2, 3], 0).is_empty());
    }
}
