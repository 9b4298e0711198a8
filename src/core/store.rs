// Owned contiguous record buffer; every offset is computed from the record
// width, never cached.
use crate::core::error::{Error, ErrorKind};

pub const FLAG_ACTIVE: u8 = b' ';
pub const FLAG_DELETED: u8 = b'*';
pub const EOF_MARKER: u8 = 0x1A;

/// All records back-to-back, each `record_len` bytes: one deletion-flag byte
/// followed by the fixed-width field slots.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordStore {
    bytes: Vec<u8>,
    record_len: usize,
}

impl RecordStore {
    pub fn new(record_len: usize) -> Self {
        Self {
            bytes: Vec::new(),
            record_len,
        }
    }

    /// Install raw record bytes sliced off a loaded file. Accepts an optional
    /// single trailing EOF marker; any other length mismatch against the
    /// declared count is corruption, not something to repair.
    pub fn from_bytes(mut bytes: Vec<u8>, record_len: usize, declared_count: u32) -> Result<Self, Error> {
        let expected = record_len
            .checked_mul(declared_count as usize)
            .ok_or_else(|| {
                Error::new(ErrorKind::CorruptHeader).with_message("record region length overflow")
            })?;
        if bytes.len() == expected + 1 && bytes[expected] == EOF_MARKER {
            bytes.truncate(expected);
        }
        if bytes.len() != expected {
            return Err(Error::new(ErrorKind::CorruptHeader).with_message(format!(
                "record region holds {} bytes but the header declares {declared_count} records of {record_len}",
                bytes.len()
            )));
        }
        Ok(Self { bytes, record_len })
    }

    pub fn record_count(&self) -> usize {
        if self.record_len == 0 {
            return 0;
        }
        self.bytes.len() / self.record_len
    }

    pub fn record_len(&self) -> usize {
        self.record_len
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Append one blank record: not-deleted flag, space-filled field slots.
    /// Returns the new row index.
    pub fn append_blank(&mut self) -> usize {
        let row = self.record_count();
        self.bytes.resize(self.bytes.len() + self.record_len, b' ');
        row
    }

    pub fn field_bytes(&self, row: usize, offset: usize, len: usize) -> Result<&[u8], Error> {
        let start = self.record_start(row)? + self.slot_start(offset, len)?;
        Ok(&self.bytes[start..start + len])
    }

    /// Overwrite one fixed-width slot in place. Bounds are checked before any
    /// byte moves, so a failure leaves the buffer untouched.
    pub fn set_field_bytes(&mut self, row: usize, offset: usize, encoded: &[u8]) -> Result<(), Error> {
        let start = self.record_start(row)? + self.slot_start(offset, encoded.len())?;
        self.bytes[start..start + encoded.len()].copy_from_slice(encoded);
        Ok(())
    }

    pub fn is_deleted(&self, row: usize) -> Result<bool, Error> {
        let start = self.record_start(row)?;
        Ok(self.bytes[start] == FLAG_DELETED)
    }

    pub fn set_deleted(&mut self, row: usize, deleted: bool) -> Result<(), Error> {
        let start = self.record_start(row)?;
        self.bytes[start] = if deleted { FLAG_DELETED } else { FLAG_ACTIVE };
        Ok(())
    }

    fn record_start(&self, row: usize) -> Result<usize, Error> {
        if row >= self.record_count() {
            return Err(Error::new(ErrorKind::IndexOutOfRange)
                .with_message(format!(
                    "row {row} outside 0..{}",
                    self.record_count()
                ))
                .with_row(row));
        }
        Ok(row * self.record_len)
    }

    fn slot_start(&self, offset: usize, len: usize) -> Result<usize, Error> {
        if offset == 0 || offset + len > self.record_len {
            return Err(Error::new(ErrorKind::IndexOutOfRange)
                .with_message("field slot outside record bounds"));
        }
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordStore, EOF_MARKER, FLAG_DELETED};
    use crate::core::error::ErrorKind;

    fn store_with_rows(rows: usize) -> RecordStore {
        let mut store = RecordStore::new(6);
        for _ in 0..rows {
            store.append_blank();
        }
        store
    }

    #[test]
    fn append_blank_grows_by_one_record() {
        let mut store = RecordStore::new(6);
        assert_eq!(store.record_count(), 0);
        let row = store.append_blank();
        assert_eq!(row, 0);
        assert_eq!(store.record_count(), 1);
        assert_eq!(store.as_bytes(), b"      ");
    }

    #[test]
    fn append_blank_leaves_existing_records_untouched() {
        let mut store = store_with_rows(1);
        store.set_field_bytes(0, 1, b"abcde").expect("set");
        let before = store.as_bytes()[..6].to_vec();
        store.append_blank();
        assert_eq!(&store.as_bytes()[..6], before.as_slice());
    }

    #[test]
    fn set_field_bytes_overwrites_only_the_slot() {
        let mut store = store_with_rows(2);
        store.set_field_bytes(1, 2, b"xy").expect("set");
        assert_eq!(store.as_bytes(), b"        xy  ");
        assert_eq!(store.field_bytes(1, 2, 2).expect("get"), b"xy");
    }

    #[test]
    fn mark_deleted_flips_only_the_flag_byte() {
        let mut store = store_with_rows(2);
        store.set_field_bytes(0, 1, b"aaaaa").expect("set");
        let mut expected = store.as_bytes().to_vec();
        store.set_deleted(0, true).expect("delete");
        expected[0] = FLAG_DELETED;
        assert_eq!(store.as_bytes(), expected.as_slice());
        assert!(store.is_deleted(0).expect("deleted"));
        assert!(!store.is_deleted(1).expect("active"));
    }

    #[test]
    fn out_of_range_rows_are_rejected() {
        let store = store_with_rows(1);
        let err = store.field_bytes(3, 1, 2).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        assert_eq!(err.row(), Some(3));
    }

    #[test]
    fn slots_cannot_touch_the_flag_byte_or_overrun() {
        let mut store = store_with_rows(1);
        let err = store.set_field_bytes(0, 0, b"x").expect_err("flag byte");
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
        let err = store.set_field_bytes(0, 4, b"xyz").expect_err("overrun");
        assert_eq!(err.kind(), ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn from_bytes_checks_the_declared_count() {
        let err = RecordStore::from_bytes(vec![b' '; 15], 10, 2).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::CorruptHeader);
        let store = RecordStore::from_bytes(vec![b' '; 20], 10, 2).expect("exact");
        assert_eq!(store.record_count(), 2);
    }

    #[test]
    fn from_bytes_tolerates_a_trailing_eof_marker() {
        let mut bytes = vec![b' '; 12];
        bytes.push(EOF_MARKER);
        let store = RecordStore::from_bytes(bytes, 6, 2).expect("load");
        assert_eq!(store.record_count(), 2);
        assert_eq!(store.as_bytes().len(), 12);
    }
}
