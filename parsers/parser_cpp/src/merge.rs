use crate::ast::{MergeMode, Value};

/// Combine an inherited array with a local one.
///
/// `Replace` discards the inherited sequence. `Append` keeps the inherited
/// items first and the local items after, without deduplication; repeated
/// entries (texture paths, magazine names) are legal in the dialect.
pub fn merge_arrays(inherited: &[Value], local: &[Value], mode: MergeMode) -> Vec<Value> {
    match mode {
        MergeMode::Replace => local.to_vec(),
        MergeMode::Append => {
            let mut merged = Vec::with_capacity(inherited.len() + local.len());
            merged.extend_from_slice(inherited);
            merged.extend_from_slice(local);
            merged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::Str(s.to_string())).collect()
    }

    #[test]
    fn replace_discards_inherited() {
        let merged = merge_arrays(
            &strings(&["a", "b"]),
            &strings(&["c"]),
            MergeMode::Replace,
        );
        assert_eq!(merged, strings(&["c"]));
    }

    #[test]
    fn append_keeps_inherited_order_first() {
        let merged = merge_arrays(
            &strings(&["a", "b"]),
            &strings(&["c", "d"]),
            MergeMode::Append,
        );
        assert_eq!(merged, strings(&["a", "b", "c", "d"]));
    }

    #[test]
    fn append_preserves_duplicates() {
        let merged = merge_arrays(&strings(&["tex.paa"]), &strings(&["tex.paa"]), MergeMode::Append);
        assert_eq!(merged, strings(&["tex.paa", "tex.paa"]));
    }

    #[test]
    fn append_to_empty_inherited() {
        let merged = merge_arrays(&[], &strings(&["a"]), MergeMode::Append);
        assert_eq!(merged, strings(&["a"]));
    }
}
