//! The comma-concat merge operator.

use rocksdb::MergeOperands;

/// Name under which the operator is registered; RocksDB persists the
/// name and refuses to open a database with a different one.
pub(crate) const MERGE_OPERATOR_NAME: &str = "quagga.concat";

/// Associative comma-concat merge.
///
/// `merge(key, suffix)` must behave as `existing ∥ "," ∥ suffix`,
/// creating the key when absent. RocksDB hands us the existing value
/// plus the ordered operand list for this key; operand order within a
/// committed batch is the order the merges were issued in, which the
/// bulk writer relies on.
pub(crate) fn concat_merge(
    _key: &[u8],
    existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    let capacity = existing.map(|v| v.len() + 1).unwrap_or(0)
        + operands.iter().map(|op| op.len() + 1).sum::<usize>();
    let mut merged = Vec::with_capacity(capacity);

    if let Some(value) = existing {
        merged.extend_from_slice(value);
    }
    for operand in operands.iter() {
        if !merged.is_empty() {
            merged.push(b',');
        }
        merged.extend_from_slice(operand);
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use rocksdb::{Options, DB};
    use tempdir::TempDir;

    use super::*;

    fn open(dir: &TempDir) -> DB {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_merge_operator_associative(MERGE_OPERATOR_NAME, concat_merge);
        DB::open(&opts, dir.path()).unwrap()
    }

    #[test]
    fn merge_creates_then_appends_with_comma() {
        quagga_test::init();

        let dir = TempDir::new("quagga-merge").unwrap();
        let db = open(&dir);

        db.merge(b"k", b"alpha").unwrap();
        assert_eq!(db.get(b"k").unwrap().unwrap(), b"alpha");

        db.merge(b"k", b"beta").unwrap();
        db.merge(b"k", b"gamma").unwrap();
        assert_eq!(db.get(b"k").unwrap().unwrap(), b"alpha,beta,gamma");
    }

    #[test]
    fn merge_does_not_dedup() {
        quagga_test::init();

        let dir = TempDir::new("quagga-merge").unwrap();
        let db = open(&dir);

        db.merge(b"k", b"row").unwrap();
        db.merge(b"k", b"row").unwrap();
        assert_eq!(db.get(b"k").unwrap().unwrap(), b"row,row");
    }

    #[test]
    fn merge_after_set_appends_to_the_overwrite() {
        quagga_test::init();

        let dir = TempDir::new("quagga-merge").unwrap();
        let db = open(&dir);

        db.merge(b"k", b"old").unwrap();
        db.put(b"k", b"fresh").unwrap();
        db.merge(b"k", b"suffix").unwrap();
        assert_eq!(db.get(b"k").unwrap().unwrap(), b"fresh,suffix");
    }
}
