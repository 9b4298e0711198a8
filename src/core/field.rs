// Field descriptor layout, per-type storage rules, and fixed-width value codecs.
use bstr::ByteSlice;

use crate::core::encoding::TableEncoding;
use crate::core::error::{Error, ErrorKind};

pub const FIELD_DESCRIPTOR_LEN: usize = 32;
pub const MAX_FIELD_NAME_LEN: usize = 10;

const LOGICAL_VALUES: &[u8] = b"TFYNtfyn?";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
    Memo,
}

impl FieldType {
    pub fn code(self) -> u8 {
        match self {
            FieldType::Character => b'C',
            FieldType::Numeric => b'N',
            FieldType::Float => b'F',
            FieldType::Date => b'D',
            FieldType::Logical => b'L',
            FieldType::Memo => b'M',
        }
    }

    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            b'C' => Ok(FieldType::Character),
            b'N' => Ok(FieldType::Numeric),
            b'F' => Ok(FieldType::Float),
            b'D' => Ok(FieldType::Date),
            b'L' => Ok(FieldType::Logical),
            b'M' => Ok(FieldType::Memo),
            _ => Err(Error::new(ErrorKind::InvalidFieldDefinition)
                .with_message(format!("unsupported field type code 0x{code:02x}"))),
        }
    }

    fn length_bounds(self) -> (u8, u8) {
        match self {
            FieldType::Character => (1, 254),
            FieldType::Numeric | FieldType::Float => (1, 20),
            FieldType::Date => (8, 8),
            FieldType::Logical => (1, 1),
            FieldType::Memo => (10, 10),
        }
    }

    pub fn allows_decimals(self) -> bool {
        matches!(self, FieldType::Numeric | FieldType::Float)
    }
}

/// One column: name, type, stored byte width, and decimal precision.
/// The on-disk form is a fixed 32-byte descriptor slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    field_type: FieldType,
    length: u8,
    decimal_count: u8,
}

impl FieldDescriptor {
    pub fn new(
        name: impl Into<String>,
        field_type: FieldType,
        length: u8,
        decimal_count: u8,
    ) -> Result<Self, Error> {
        let name = name.into();
        validate_name(&name)?;
        Self::validate(field_type, length, decimal_count)?;
        Ok(Self {
            name,
            field_type,
            length,
            decimal_count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn decimal_count(&self) -> u8 {
        self.decimal_count
    }

    /// Per-type width/decimal rules shared by constructors and the loader.
    pub fn validate(field_type: FieldType, length: u8, decimal_count: u8) -> Result<(), Error> {
        let (min, max) = field_type.length_bounds();
        if length < min || length > max {
            return Err(Error::new(ErrorKind::TypeConstraint).with_message(format!(
                "{field_type:?} length {length} outside {min}..={max}"
            )));
        }
        if field_type.allows_decimals() {
            if decimal_count >= length {
                return Err(Error::new(ErrorKind::TypeConstraint).with_message(format!(
                    "decimal count {decimal_count} must be less than length {length}"
                )));
            }
        } else if decimal_count != 0 {
            return Err(Error::new(ErrorKind::TypeConstraint).with_message(format!(
                "{field_type:?} fields cannot carry a decimal count"
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> [u8; FIELD_DESCRIPTOR_LEN] {
        let mut buf = [0u8; FIELD_DESCRIPTOR_LEN];
        buf[0..self.name.len()].copy_from_slice(self.name.as_bytes());
        buf[11] = self.field_type.code();
        buf[16] = self.length;
        buf[17] = self.decimal_count;
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < FIELD_DESCRIPTOR_LEN {
            return Err(Error::new(ErrorKind::CorruptHeader)
                .with_message("field descriptor slot too small"));
        }
        let name_bytes = &buf[0..=MAX_FIELD_NAME_LEN];
        let name_end = name_bytes
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(name_bytes.len());
        let name = std::str::from_utf8(&name_bytes[..name_end])
            .map_err(|_| {
                Error::new(ErrorKind::InvalidFieldDefinition)
                    .with_message("field name is not valid ASCII")
            })?
            .to_string();
        validate_name(&name)?;

        let field_type = FieldType::from_code(buf[11])?;
        let length = buf[16];
        let decimal_count = buf[17];
        Self::validate(field_type, length, decimal_count).map_err(|err| {
            Error::new(ErrorKind::InvalidFieldDefinition)
                .with_message(err.message().unwrap_or("invalid field descriptor").to_string())
                .with_field(&name)
        })?;

        Ok(Self {
            name,
            field_type,
            length,
            decimal_count,
        })
    }

    /// The type-appropriate "empty" slot: all spaces at the stored width.
    pub fn blank_value(&self) -> Vec<u8> {
        vec![b' '; self.length as usize]
    }

    /// Encode `value` into exactly `length` bytes, or fail without side effects.
    pub fn encode_value(&self, value: &str, encoding: TableEncoding) -> Result<Vec<u8>, Error> {
        let width = self.length as usize;
        match self.field_type {
            FieldType::Character => {
                let bytes = encoding.encode(value).map_err(|err| err.with_field(&self.name))?;
                if bytes.len() > width {
                    return Err(self.too_long(bytes.len()));
                }
                let mut out = bytes;
                out.resize(width, b' ');
                Ok(out)
            }
            FieldType::Numeric | FieldType::Float => {
                if value.is_empty() {
                    return Ok(self.blank_value());
                }
                validate_number(value).map_err(|err| err.with_field(&self.name))?;
                if value.len() > width {
                    return Err(self.too_long(value.len()));
                }
                Ok(right_justify(value.as_bytes(), width))
            }
            FieldType::Date => {
                if value.is_empty() {
                    return Ok(self.blank_value());
                }
                validate_date(value).map_err(|err| err.with_field(&self.name))?;
                Ok(value.as_bytes().to_vec())
            }
            FieldType::Logical => {
                if value.is_empty() {
                    return Ok(self.blank_value());
                }
                let bytes = value.as_bytes();
                if bytes.len() != 1 || !LOGICAL_VALUES.contains(&bytes[0]) {
                    return Err(Error::new(ErrorKind::TypeConstraint)
                        .with_message(format!("logical value {value:?} is not one of T F Y N ?"))
                        .with_field(&self.name));
                }
                Ok(bytes.to_vec())
            }
            FieldType::Memo => {
                if value.is_empty() {
                    return Ok(self.blank_value());
                }
                if !value.bytes().all(|byte| byte.is_ascii_digit()) {
                    return Err(Error::new(ErrorKind::TypeConstraint)
                        .with_message("memo reference must be an all-digit block number")
                        .with_field(&self.name));
                }
                if value.len() > width {
                    return Err(self.too_long(value.len()));
                }
                Ok(right_justify(value.as_bytes(), width))
            }
        }
    }

    /// Inverse of `encode_value`: strips padding and applies the table
    /// encoding for Character fields. Non-Character slots are ASCII.
    pub fn decode_value(&self, bytes: &[u8], encoding: TableEncoding) -> String {
        match self.field_type {
            FieldType::Character => {
                let trimmed = bytes.trim_end_with(|c| c == ' ' || c == '\0');
                encoding.decode(trimmed)
            }
            _ => {
                let trimmed = bytes.trim_with(|c| c == ' ' || c == '\0');
                String::from_utf8_lossy(trimmed).into_owned()
            }
        }
    }

    fn too_long(&self, got: usize) -> Error {
        Error::new(ErrorKind::ValueTooLong)
            .with_message(format!(
                "encoded value needs {got} bytes but the field stores {}",
                self.length
            ))
            .with_field(&self.name)
    }
}

fn validate_name(name: &str) -> Result<(), Error> {
    let invalid = |detail: &str| {
        Error::new(ErrorKind::InvalidFieldDefinition)
            .with_message(format!("invalid field name {name:?}: {detail}"))
    };
    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(invalid("longer than 10 bytes"));
    }
    let mut bytes = name.bytes();
    let first = bytes.next().unwrap_or(0);
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return Err(invalid("must start with a letter or underscore"));
    }
    if !bytes.all(|byte| byte.is_ascii_alphanumeric() || byte == b'_') {
        return Err(invalid("only ASCII letters, digits, and underscore"));
    }
    Ok(())
}

// Sign, digits, at most one decimal point. The point spends one byte of the
// field width just like any digit.
fn validate_number(value: &str) -> Result<(), Error> {
    let bytes = value.as_bytes();
    let digits = match bytes.first().copied() {
        Some(b'+') | Some(b'-') => &bytes[1..],
        _ => bytes,
    };
    let mut seen_digit = false;
    let mut seen_point = false;
    for &byte in digits {
        match byte {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_point => seen_point = true,
            _ => {
                return Err(Error::new(ErrorKind::TypeConstraint)
                    .with_message(format!("{value:?} is not a decimal number")));
            }
        }
    }
    if !seen_digit {
        return Err(Error::new(ErrorKind::TypeConstraint)
            .with_message(format!("{value:?} is not a decimal number")));
    }
    Ok(())
}

fn validate_date(value: &str) -> Result<(), Error> {
    let malformed = || {
        Error::new(ErrorKind::TypeConstraint)
            .with_message(format!("date {value:?} is not YYYYMMDD"))
    };
    if value.len() != 8 || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(malformed());
    }
    let year: i32 = value[0..4].parse().map_err(|_| malformed())?;
    let month: u8 = value[4..6].parse().map_err(|_| malformed())?;
    let day: u8 = value[6..8].parse().map_err(|_| malformed())?;
    let month = time::Month::try_from(month).map_err(|_| malformed())?;
    time::Date::from_calendar_date(year, month, day).map_err(|_| {
        Error::new(ErrorKind::TypeConstraint)
            .with_message(format!("date {value:?} is not a real calendar date"))
    })?;
    Ok(())
}

fn right_justify(value: &[u8], width: usize) -> Vec<u8> {
    let mut out = vec![b' '; width];
    out[width - value.len()..].copy_from_slice(value);
    out
}
