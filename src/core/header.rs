// Fixed 32-byte table preamble codec plus the field-descriptor block codec.
use crate::core::error::{Error, ErrorKind};
use crate::core::field::{FieldDescriptor, FIELD_DESCRIPTOR_LEN};

pub const TABLE_HEADER_LEN: usize = 32;
pub const HEADER_TERMINATOR: u8 = 0x0D;
pub const VERSION_LEVEL5: u8 = 0x03;
pub const VERSION_LEVEL5_MEMO: u8 = 0x83;

/// Header bytes 1..=3: YY (years since 1900), MM, DD.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LastUpdate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl LastUpdate {
    pub fn from_date(date: time::Date) -> Self {
        Self {
            year: date.year().clamp(1900, 1900 + 255) as u16,
            month: date.month() as u8,
            day: date.day(),
        }
    }

    fn encode(self) -> [u8; 3] {
        [
            self.year.saturating_sub(1900).min(255) as u8,
            self.month,
            self.day,
        ]
    }

    fn decode(bytes: [u8; 3]) -> Self {
        Self {
            year: 1900 + bytes[0] as u16,
            month: bytes[1],
            day: bytes[2],
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableHeader {
    pub version: u8,
    pub last_update: LastUpdate,
    pub record_count: u32,
    pub header_len: u16,
    pub record_len: u16,
    pub transaction_flag: u8,
    pub encryption_flag: u8,
    pub mdx_flag: u8,
    pub language_driver: u8,
}

impl TableHeader {
    pub fn encode(&self) -> [u8; TABLE_HEADER_LEN] {
        let mut buf = [0u8; TABLE_HEADER_LEN];
        buf[0] = self.version;
        buf[1..4].copy_from_slice(&self.last_update.encode());
        buf[4..8].copy_from_slice(&self.record_count.to_le_bytes());
        buf[8..10].copy_from_slice(&self.header_len.to_le_bytes());
        buf[10..12].copy_from_slice(&self.record_len.to_le_bytes());
        buf[14] = self.transaction_flag;
        buf[15] = self.encryption_flag;
        buf[28] = self.mdx_flag;
        buf[29] = self.language_driver;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < TABLE_HEADER_LEN {
            return Err(Error::new(ErrorKind::CorruptHeader).with_message("header too small"));
        }
        let header = Self {
            version: buf[0],
            last_update: LastUpdate::decode([buf[1], buf[2], buf[3]]),
            record_count: u32::from_le_bytes(read_4(buf, 4)),
            header_len: u16::from_le_bytes(read_2(buf, 8)),
            record_len: u16::from_le_bytes(read_2(buf, 10)),
            transaction_flag: buf[14],
            encryption_flag: buf[15],
            mdx_flag: buf[28],
            language_driver: buf[29],
        };
        if header.header_len == 0 {
            return Err(Error::new(ErrorKind::CorruptHeader).with_message("header length is zero"));
        }
        if header.record_len == 0 {
            return Err(Error::new(ErrorKind::CorruptHeader).with_message("record length is zero"));
        }
        Ok(header)
    }

    /// Structural cross-checks against the buffer the header arrived in.
    pub fn validate(&self, total_len: usize) -> Result<(), Error> {
        let header_len = self.header_len as usize;
        if header_len < TABLE_HEADER_LEN + 1 {
            return Err(Error::new(ErrorKind::CorruptHeader)
                .with_message("header length below fixed preamble size"));
        }
        if (header_len - TABLE_HEADER_LEN - 1) % FIELD_DESCRIPTOR_LEN != 0 {
            return Err(Error::new(ErrorKind::CorruptHeader)
                .with_message("header length does not align to field descriptor slots"));
        }
        if header_len > total_len {
            return Err(Error::new(ErrorKind::CorruptHeader)
                .with_message("header length exceeds file size"));
        }
        Ok(())
    }

    pub fn declared_field_count(&self) -> usize {
        (self.header_len as usize - TABLE_HEADER_LEN - 1) / FIELD_DESCRIPTOR_LEN
    }
}

pub fn expected_header_len(field_count: usize) -> u16 {
    (TABLE_HEADER_LEN + field_count * FIELD_DESCRIPTOR_LEN + 1) as u16
}

/// Decode the descriptor block that follows the preamble. `block` spans from
/// offset 32 up to and including the 0x0D terminator. A single invalid slot
/// aborts the whole decode, identifying the offending field index.
pub fn decode_fields(block: &[u8]) -> Result<Vec<FieldDescriptor>, Error> {
    let mut fields = Vec::new();
    let mut offset = 0usize;
    loop {
        if offset >= block.len() {
            return Err(Error::new(ErrorKind::CorruptHeader)
                .with_message("field block missing 0x0D terminator"));
        }
        if block[offset] == HEADER_TERMINATOR {
            return Ok(fields);
        }
        if block.len() - offset < FIELD_DESCRIPTOR_LEN {
            return Err(Error::new(ErrorKind::CorruptHeader)
                .with_message("truncated field descriptor slot"));
        }
        let slot = &block[offset..offset + FIELD_DESCRIPTOR_LEN];
        let field = FieldDescriptor::decode(slot).map_err(|err| err.with_column(fields.len()))?;
        fields.push(field);
        offset += FIELD_DESCRIPTOR_LEN;
    }
}

/// Pure function of the field list: N descriptor slots plus the terminator.
pub fn encode_field_block(fields: &[FieldDescriptor]) -> Vec<u8> {
    let mut block = Vec::with_capacity(fields.len() * FIELD_DESCRIPTOR_LEN + 1);
    for field in fields {
        block.extend_from_slice(&field.encode());
    }
    block.push(HEADER_TERMINATOR);
    block
}

fn read_2(buf: &[u8], offset: usize) -> [u8; 2] {
    let mut out = [0u8; 2];
    out.copy_from_slice(&buf[offset..offset + 2]);
    out
}

fn read_4(buf: &[u8], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    out
}
