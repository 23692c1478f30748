//! obseq-diff - minimal edit scripts between ordered sequences.
//!
//! Computes the shortest `Insert`/`Remove` script that transforms one
//! sequence into another, by longest-common-subsequence backtracking.
//! Replacements are never synthesized as a dedicated operation; a replaced
//! element shows up as a removal paired with an insertion.
//!
//! Index semantics follow what an incremental list consumer applies in one
//! batch: removal indices address the *source* sequence, insertion indices
//! address the *destination* sequence.

/// A single step of an edit script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit<E> {
    /// `element` appears at `index` of the destination sequence.
    Insert { index: usize, element: E },
    /// `element` disappears from `index` of the source sequence.
    Remove { index: usize, element: E },
}

impl<E> Edit<E> {
    /// The index carried by this step.
    pub fn index(&self) -> usize {
        match self {
            Edit::Insert { index, .. } | Edit::Remove { index, .. } => *index,
        }
    }

    /// The element carried by this step.
    pub fn element(&self) -> &E {
        match self {
            Edit::Insert { element, .. } | Edit::Remove { element, .. } => element,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Edit::Insert { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Edit::Remove { .. })
    }
}

/// Computes the minimal edit script transforming `old` into `new`.
///
/// Builds the `(n+1) x (m+1)` prefix LCS table and backtracks from the
/// bottom-right corner. Ties prefer consuming from `new` (an `Insert`), so
/// identical inputs always produce the identical script. Equal sequences
/// yield an empty script. `O(n * m)` time and space.
///
/// # Examples
///
/// ```
/// use obseq_diff::{diff, Edit};
///
/// let script = diff(&["a", "b"], &["b", "c"]);
/// assert_eq!(
///     script,
///     vec![
///         Edit::Remove { index: 0, element: "a" },
///         Edit::Insert { index: 1, element: "c" },
///     ],
/// );
/// ```
pub fn diff<E: PartialEq + Clone>(old: &[E], new: &[E]) -> Vec<Edit<E>> {
    let n = old.len();
    let m = new.len();
    if n == 0 && m == 0 {
        return Vec::new();
    }

    // table[i][j] = LCS length of old[0..i] and new[0..j].
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            table[i][j] = if old[i - 1] == new[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }

    let mut script = Vec::with_capacity(n + m - 2 * table[n][m]);
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if j > 0 && table[i][j] == table[i][j - 1] {
            script.push(Edit::Insert {
                index: j - 1,
                element: new[j - 1].clone(),
            });
            j -= 1;
        } else if i > 0 && table[i][j] == table[i - 1][j] {
            script.push(Edit::Remove {
                index: i - 1,
                element: old[i - 1].clone(),
            });
            i -= 1;
        } else {
            // Matched element, no operation.
            i -= 1;
            j -= 1;
        }
    }
    script.reverse();
    script
}

/// Replays an edit script against `base`, batch-style.
///
/// Removals land first: their indices address `base`, and since `diff`
/// emits removals in ascending source order, each one is offset by the
/// number of removals already applied. Insertions then land directly at
/// their destination indices, in script order.
pub fn apply<E: Clone>(base: &[E], script: &[Edit<E>]) -> Vec<E> {
    let mut out: Vec<E> = base.to_vec();
    let mut removed = 0usize;
    for edit in script {
        if let Edit::Remove { index, .. } = edit {
            out.remove(index - removed);
            removed += 1;
        }
    }
    for edit in script {
        if let Edit::Insert { index, element } = edit {
            out.insert(*index, element.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_sequences_yield_empty_script() {
        let a = vec!["x", "y", "z"];
        assert!(diff(&a, &a).is_empty());
        let empty: Vec<&str> = Vec::new();
        assert!(diff(&empty, &empty).is_empty());
    }

    #[test]
    fn empty_to_full_is_all_inserts() {
        let script = diff(&[], &[1, 2, 3]);
        assert_eq!(
            script,
            vec![
                Edit::Insert { index: 0, element: 1 },
                Edit::Insert { index: 1, element: 2 },
                Edit::Insert { index: 2, element: 3 },
            ],
        );
    }

    #[test]
    fn full_to_empty_is_all_removes_at_source_indices() {
        let script = diff(&["x", "y"], &[]);
        assert_eq!(
            script,
            vec![
                Edit::Remove { index: 0, element: "x" },
                Edit::Remove { index: 1, element: "y" },
            ],
        );
        assert!(apply(&["x", "y"], &script).is_empty());
    }

    #[test]
    fn swap_is_one_remove_one_insert() {
        let old = vec![1, 2, 3, 4];
        let new = vec![1, 3, 2, 4];
        let script = diff(&old, &new);
        assert_eq!(
            script,
            vec![
                Edit::Remove { index: 1, element: 2 },
                Edit::Insert { index: 2, element: 2 },
            ],
        );
        assert_eq!(apply(&old, &script), new);
    }

    #[test]
    fn backtrack_rule_on_mixed_edit() {
        // One removal, two insertions; "c" survives as part of the LCS.
        let old = vec!["a", "b", "c"];
        let new = vec!["b", "c-x", "c", "d"];
        let script = diff(&old, &new);
        assert_eq!(
            script,
            vec![
                Edit::Remove { index: 0, element: "a" },
                Edit::Insert { index: 1, element: "c-x" },
                Edit::Insert { index: 3, element: "d" },
            ],
        );
        assert_eq!(apply(&old, &script), new);
    }

    #[test]
    fn duplicate_elements_tie_breaks_toward_insert() {
        let script = diff(&["x"], &["x", "x"]);
        assert_eq!(
            script,
            vec![Edit::Insert { index: 1, element: "x" }],
        );
    }

    #[test]
    fn script_length_matches_lcs_bound() {
        let old = vec![1, 2, 3, 4, 5];
        let new = vec![2, 4, 6];
        let script = diff(&old, &new);
        // LCS is [2, 4], so the bound is 5 + 3 - 2*2 = 4.
        assert_eq!(script.len(), 4);
        assert_eq!(apply(&old, &script), new);
    }
}
