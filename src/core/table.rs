// Table aggregate tying the field list to the record store, plus the
// byte-buffer loader and the canonical writer.
use tracing::debug;

use crate::core::encoding::TableEncoding;
use crate::core::error::{Error, ErrorKind};
use crate::core::field::{FieldDescriptor, FieldType};
use crate::core::header::{
    decode_fields, encode_field_block, expected_header_len, LastUpdate, TableHeader,
    TABLE_HEADER_LEN, VERSION_LEVEL5, VERSION_LEVEL5_MEMO,
};
use crate::core::store::RecordStore;

#[derive(Debug)]
pub struct Table {
    fields: Vec<FieldDescriptor>,
    store: RecordStore,
    encoding: TableEncoding,
    version: u8,
    last_update: LastUpdate,
    transaction_flag: u8,
    encryption_flag: u8,
    mdx_flag: u8,
    language_driver: u8,
}

impl Table {
    /// Fresh table with an empty field list, stamped with today's date.
    /// Fields may be appended until the first record exists.
    pub fn new(encoding: TableEncoding) -> Self {
        let today = time::OffsetDateTime::now_utc().date();
        Self {
            fields: Vec::new(),
            store: RecordStore::new(1),
            encoding,
            version: VERSION_LEVEL5,
            last_update: LastUpdate::from_date(today),
            transaction_flag: 0,
            encryption_flag: 0,
            mdx_flag: 0,
            language_driver: 0,
        }
    }

    /// Single-pass decode of a complete in-memory file image:
    /// preamble, then the field block, then the raw record region installed
    /// verbatim. Character decoding happens lazily when a value is read.
    pub fn from_bytes(bytes: &[u8], encoding: TableEncoding) -> Result<Self, Error> {
        let header = TableHeader::decode(bytes)?;
        header.validate(bytes.len())?;

        let block = &bytes[TABLE_HEADER_LEN..header.header_len as usize];
        let fields = decode_fields(block)?;
        if header.header_len != expected_header_len(fields.len()) {
            return Err(Error::new(ErrorKind::CorruptHeader).with_message(format!(
                "header length {} disagrees with {} decoded fields",
                header.header_len,
                fields.len()
            )));
        }
        ensure_unique_names(&fields)?;

        let record_len = record_width_of(&fields);
        if record_len != header.record_len as usize {
            return Err(Error::new(ErrorKind::CorruptHeader).with_message(format!(
                "header record length {} disagrees with field widths totalling {record_len}",
                header.record_len
            )));
        }

        let store = RecordStore::from_bytes(
            bytes[header.header_len as usize..].to_vec(),
            record_len,
            header.record_count,
        )?;

        debug!(
            fields = fields.len(),
            records = store.record_count(),
            record_len,
            encoding = encoding.name(),
            "decoded table"
        );

        Ok(Self {
            fields,
            store,
            encoding,
            version: header.version,
            last_update: header.last_update,
            transaction_flag: header.transaction_flag,
            encryption_flag: header.encryption_flag,
            mdx_flag: header.mdx_flag,
            language_driver: header.language_driver,
        })
    }

    /// Canonical serialization: preamble, field block, raw record bytes.
    /// The header is recomputed from current state on every call.
    pub fn to_bytes(&self) -> Vec<u8> {
        let header = TableHeader {
            version: self.effective_version(),
            last_update: self.last_update,
            record_count: self.store.record_count() as u32,
            header_len: expected_header_len(self.fields.len()),
            record_len: self.record_width() as u16,
            transaction_flag: self.transaction_flag,
            encryption_flag: self.encryption_flag,
            mdx_flag: self.mdx_flag,
            language_driver: self.language_driver,
        };
        let block = encode_field_block(&self.fields);
        let records = self.store.as_bytes();

        let mut out = Vec::with_capacity(TABLE_HEADER_LEN + block.len() + records.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&block);
        out.extend_from_slice(records);

        debug!(
            fields = self.fields.len(),
            records = self.store.record_count(),
            bytes = out.len(),
            "encoded table"
        );
        out
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name().eq_ignore_ascii_case(name))
    }

    pub fn record_count(&self) -> usize {
        self.store.record_count()
    }

    pub fn record_width(&self) -> usize {
        record_width_of(&self.fields)
    }

    pub fn encoding(&self) -> TableEncoding {
        self.encoding
    }

    pub fn version(&self) -> u8 {
        self.effective_version()
    }

    pub fn last_update(&self) -> LastUpdate {
        self.last_update
    }

    pub fn language_driver(&self) -> u8 {
        self.language_driver
    }

    /// Append a column. The layout is frozen once any record exists, since no
    /// stored record accounts for the new column's bytes.
    pub fn add_field(&mut self, field: FieldDescriptor) -> Result<(), Error> {
        if self.store.record_count() > 0 {
            return Err(Error::new(ErrorKind::SchemaFrozen)
                .with_message("cannot add a field once records exist")
                .with_field(field.name())
                .with_hint("Build the full field list before appending records."));
        }
        if self.field_index(field.name()).is_some() {
            return Err(Error::new(ErrorKind::InvalidFieldDefinition)
                .with_message(format!("duplicate field name {:?}", field.name()))
                .with_field(field.name()));
        }
        self.fields.push(field);
        self.store = RecordStore::new(self.record_width());
        Ok(())
    }

    pub fn add_character_field(&mut self, name: &str, length: u8) -> Result<(), Error> {
        self.add_field(FieldDescriptor::new(name, FieldType::Character, length, 0)?)
    }

    pub fn add_numeric_field(&mut self, name: &str, length: u8, decimals: u8) -> Result<(), Error> {
        self.add_field(FieldDescriptor::new(name, FieldType::Numeric, length, decimals)?)
    }

    pub fn add_float_field(&mut self, name: &str, length: u8, decimals: u8) -> Result<(), Error> {
        self.add_field(FieldDescriptor::new(name, FieldType::Float, length, decimals)?)
    }

    pub fn add_date_field(&mut self, name: &str) -> Result<(), Error> {
        self.add_field(FieldDescriptor::new(name, FieldType::Date, 8, 0)?)
    }

    pub fn add_logical_field(&mut self, name: &str) -> Result<(), Error> {
        self.add_field(FieldDescriptor::new(name, FieldType::Logical, 1, 0)?)
    }

    pub fn add_memo_field(&mut self, name: &str) -> Result<(), Error> {
        self.add_field(FieldDescriptor::new(name, FieldType::Memo, 10, 0)?)
    }

    pub fn append_blank_record(&mut self) -> Result<usize, Error> {
        if self.fields.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("table has no fields")
                .with_hint("Add fields before appending records."));
        }
        Ok(self.store.append_blank())
    }

    pub fn value(&self, row: usize, col: usize) -> Result<String, Error> {
        let field = self.field_at(col)?;
        let bytes = self
            .store
            .field_bytes(row, self.field_offset(col), field.length() as usize)?;
        Ok(field.decode_value(bytes, self.encoding))
    }

    pub fn value_by_name(&self, row: usize, name: &str) -> Result<String, Error> {
        self.value(row, self.require_field(name)?)
    }

    /// Validate and encode through the column's descriptor, then overwrite the
    /// slot in place. Fails before any byte moves.
    pub fn set_value(&mut self, row: usize, col: usize, value: &str) -> Result<(), Error> {
        let field = self.field_at(col)?;
        let encoded = field
            .encode_value(value, self.encoding)
            .map_err(|err| err.with_row(row).with_column(col))?;
        self.store
            .set_field_bytes(row, self.field_offset(col), &encoded)
    }

    pub fn set_value_by_name(&mut self, row: usize, name: &str, value: &str) -> Result<(), Error> {
        self.set_value(row, self.require_field(name)?, value)
    }

    /// Decoded values for one row, in column order.
    pub fn row_values(&self, row: usize) -> Result<Vec<String>, Error> {
        (0..self.fields.len())
            .map(|col| self.value(row, col))
            .collect()
    }

    pub fn is_deleted(&self, row: usize) -> Result<bool, Error> {
        self.store.is_deleted(row)
    }

    /// Logical deletion: flips the flag byte only, no compaction.
    pub fn set_deleted(&mut self, row: usize, deleted: bool) -> Result<(), Error> {
        self.store.set_deleted(row, deleted)
    }

    fn effective_version(&self) -> u8 {
        let has_memo = self
            .fields
            .iter()
            .any(|field| field.field_type() == FieldType::Memo);
        if has_memo && self.version == VERSION_LEVEL5 {
            VERSION_LEVEL5_MEMO
        } else {
            self.version
        }
    }

    fn field_at(&self, col: usize) -> Result<&FieldDescriptor, Error> {
        self.fields.get(col).ok_or_else(|| {
            Error::new(ErrorKind::IndexOutOfRange)
                .with_message(format!("column {col} outside 0..{}", self.fields.len()))
                .with_column(col)
        })
    }

    fn require_field(&self, name: &str) -> Result<usize, Error> {
        self.field_index(name).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("no field named {name:?}"))
                .with_field(name)
        })
    }

    fn field_offset(&self, col: usize) -> usize {
        1 + self.fields[..col]
            .iter()
            .map(|field| field.length() as usize)
            .sum::<usize>()
    }
}

fn record_width_of(fields: &[FieldDescriptor]) -> usize {
    1 + fields
        .iter()
        .map(|field| field.length() as usize)
        .sum::<usize>()
}

fn ensure_unique_names(fields: &[FieldDescriptor]) -> Result<(), Error> {
    for (index, field) in fields.iter().enumerate() {
        let clash = fields[..index]
            .iter()
            .any(|other| other.name().eq_ignore_ascii_case(field.name()));
        if clash {
            return Err(Error::new(ErrorKind::InvalidFieldDefinition)
                .with_message(format!("duplicate field name {:?}", field.name()))
                .with_field(field.name())
                .with_column(index));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Table;
    use crate::core::encoding::TableEncoding;
    use crate::core::error::ErrorKind;
    use crate::core::header::{expected_header_len, VERSION_LEVEL5_MEMO};

    fn sample_table() -> Table {
        let mut table = Table::new(TableEncoding::utf8());
        table.add_character_field("NAME", 9).expect("name");
        table.add_numeric_field("PRICE", 5, 2).expect("price");
        table.add_logical_field("ACTIVE").expect("active");
        table
    }

    #[test]
    fn record_width_counts_the_flag_byte() {
        let table = sample_table();
        assert_eq!(table.record_width(), 16);
    }

    #[test]
    fn set_then_get_is_padding_normalized_and_idempotent() {
        let mut table = sample_table();
        table.append_blank_record().expect("append");
        table.set_value(0, 0, "Ada").expect("set name");
        table.set_value(0, 1, "1.23").expect("set price");
        assert_eq!(table.value(0, 0).expect("name"), "Ada");
        assert_eq!(table.value(0, 1).expect("price"), "1.23");

        let round = table.value(0, 1).expect("price");
        table.set_value(0, 1, &round).expect("re-set");
        assert_eq!(table.value(0, 1).expect("price"), round);
    }

    #[test]
    fn append_blank_record_increments_count_and_preserves_rows() {
        let mut table = sample_table();
        table.append_blank_record().expect("append");
        table.set_value(0, 0, "first").expect("set");
        let before = table.to_bytes();
        let prefix_len = before.len();

        let row = table.append_blank_record().expect("append");
        assert_eq!(row, 1);
        assert_eq!(table.record_count(), 2);

        let after = table.to_bytes();
        // Record count in the header changes; the first record's bytes do not.
        let record_region = prefix_len - table.record_width();
        assert_eq!(
            &after[record_region..record_region + table.record_width()],
            &before[record_region..]
        );
    }

    #[test]
    fn fields_are_frozen_once_records_exist() {
        let mut table = sample_table();
        table.append_blank_record().expect("append");
        let err = table.add_date_field("BORN").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::SchemaFrozen);
    }

    #[test]
    fn duplicate_field_names_are_rejected_case_insensitively() {
        let mut table = sample_table();
        let err = table.add_character_field("name", 4).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidFieldDefinition);
    }

    #[test]
    fn append_without_fields_is_a_usage_error() {
        let mut table = Table::new(TableEncoding::utf8());
        let err = table.append_blank_record().expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn failed_set_leaves_the_table_untouched() {
        let mut table = sample_table();
        table.append_blank_record().expect("append");
        table.set_value(0, 1, "1.23").expect("set");
        let before = table.to_bytes();

        let err = table.set_value(0, 1, "12.345").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::ValueTooLong);
        assert_eq!(err.row(), Some(0));
        assert_eq!(table.to_bytes(), before);
    }

    #[test]
    fn lookup_by_name_is_case_insensitive() {
        let mut table = sample_table();
        table.append_blank_record().expect("append");
        table.set_value_by_name(0, "price", "9.99").expect("set");
        assert_eq!(table.value_by_name(0, "PRICE").expect("get"), "9.99");
        let err = table.value_by_name(0, "MISSING").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn round_trip_is_byte_exact() {
        let mut table = sample_table();
        table.append_blank_record().expect("append");
        table.set_value(0, 0, "Lovelace").expect("set");
        table.set_value(0, 1, "18.15").expect("set");
        table.set_value(0, 2, "T").expect("set");
        table.append_blank_record().expect("append");
        table.set_deleted(1, true).expect("delete");

        let bytes = table.to_bytes();
        let reloaded = Table::from_bytes(&bytes, TableEncoding::utf8()).expect("load");
        assert_eq!(reloaded.to_bytes(), bytes);
        assert_eq!(reloaded.record_count(), 2);
        assert_eq!(reloaded.value(0, 0).expect("name"), "Lovelace");
        assert!(reloaded.is_deleted(1).expect("deleted"));
        assert!(!reloaded.is_deleted(0).expect("active"));
    }

    #[test]
    fn loader_rejects_truncated_record_region() {
        // Header declares 2 records of width 10 (one Character field of 9)
        // but only 15 trailing bytes are present.
        let mut donor = Table::new(TableEncoding::utf8());
        donor.add_character_field("NAME", 9).expect("field");
        donor.append_blank_record().expect("row");
        donor.append_blank_record().expect("row");
        let mut bytes = donor.to_bytes();
        bytes.truncate(expected_header_len(1) as usize + 15);

        let err = Table::from_bytes(&bytes, TableEncoding::utf8()).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::CorruptHeader);
    }

    #[test]
    fn loader_rejects_record_length_mismatch() {
        let mut table = sample_table();
        table.append_blank_record().expect("append");
        let mut bytes = table.to_bytes();
        bytes[10] = 99; // declared record length no longer matches field widths
        let err = Table::from_bytes(&bytes, TableEncoding::utf8()).expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::CorruptHeader);
    }

    #[test]
    fn loader_keeps_raw_bytes_and_decodes_lazily() {
        let cp1252 = TableEncoding::resolve("windows-1252").expect("cp1252");
        let mut table = Table::new(cp1252);
        table.add_character_field("CITY", 8).expect("field");
        table.append_blank_record().expect("row");
        table.set_value(0, 0, "Málaga").expect("set");
        let bytes = table.to_bytes();

        // The stored byte is the cp1252 0xE1, not UTF-8.
        assert!(bytes.contains(&0xE1));
        let reloaded = Table::from_bytes(&bytes, cp1252).expect("load");
        assert_eq!(reloaded.value(0, 0).expect("city"), "Málaga");
    }

    #[test]
    fn memo_fields_flip_the_version_byte() {
        let mut table = Table::new(TableEncoding::utf8());
        table.add_character_field("TITLE", 10).expect("field");
        table.add_memo_field("BODY").expect("memo");
        let bytes = table.to_bytes();
        assert_eq!(bytes[0], VERSION_LEVEL5_MEMO);
    }
}
