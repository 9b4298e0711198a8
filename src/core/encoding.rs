//! Purpose: Centralize charset resolution for Character-field transliteration.
//! Exports: `TableEncoding`, `language_driver_label`.
//! Role: Shared policy for text conversion across load/read/write paths.
//! Invariants: Non-Character data is ASCII and never passes through here.
//! Invariants: Unknown labels and unmappable values fail loudly, never lossily.

use encoding_rs::Encoding;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableEncoding {
    inner: &'static Encoding,
}

impl TableEncoding {
    pub fn resolve(label: &str) -> Result<Self, Error> {
        Encoding::for_label(label.trim().as_bytes())
            .map(|inner| Self { inner })
            .ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("unknown encoding label {label:?}"))
                    .with_hint(
                        "Use a WHATWG encoding label such as utf-8, windows-1252, or ibm866.",
                    )
            })
    }

    pub fn utf8() -> Self {
        Self {
            inner: encoding_rs::UTF_8,
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _, _) = self.inner.decode(bytes);
        text.into_owned()
    }

    pub fn encode(&self, value: &str) -> Result<Vec<u8>, Error> {
        let (bytes, _, had_unmappable) = self.inner.encode(value);
        if had_unmappable {
            return Err(Error::new(ErrorKind::TypeConstraint)
                .with_message(format!("value is not representable in {}", self.name())));
        }
        Ok(bytes.into_owned())
    }
}

impl Default for TableEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

/// Suggested encoding label for a header language-driver byte, covering the
/// DOS/Windows code pages commonly seen in the wild. Ids whose code page has
/// no WHATWG equivalent return `None`.
pub fn language_driver_label(id: u8) -> Option<&'static str> {
    match id {
        0x03 | 0x57 => Some("windows-1252"),
        0x13 => Some("shift_jis"),
        0x4D => Some("gbk"),
        0x4E => Some("euc-kr"),
        0x4F => Some("big5"),
        0x65 => Some("ibm866"),
        0x7D => Some("windows-1255"),
        0x7E => Some("windows-1256"),
        0xC8 => Some("windows-1250"),
        0xC9 => Some("windows-1251"),
        0xCA => Some("windows-1254"),
        0xCB => Some("windows-1253"),
        0xCC => Some("windows-1257"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{language_driver_label, TableEncoding};
    use crate::core::error::ErrorKind;

    #[test]
    fn resolves_common_labels() {
        assert_eq!(TableEncoding::resolve("utf-8").expect("utf-8").name(), "UTF-8");
        assert_eq!(
            TableEncoding::resolve("windows-1252").expect("cp1252").name(),
            "windows-1252"
        );
        assert_eq!(TableEncoding::resolve("IBM866").expect("ibm866").name(), "IBM866");
    }

    #[test]
    fn unknown_label_is_a_usage_error() {
        let err = TableEncoding::resolve("klingon-7").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn cp1252_round_trips_accented_text() {
        let encoding = TableEncoding::resolve("windows-1252").expect("cp1252");
        let bytes = encoding.encode("café").expect("encode");
        assert_eq!(bytes, b"caf\xe9");
        assert_eq!(encoding.decode(&bytes), "café");
    }

    #[test]
    fn unmappable_value_is_rejected() {
        let encoding = TableEncoding::resolve("windows-1252").expect("cp1252");
        let err = encoding.encode("Δ").expect_err("should fail");
        assert_eq!(err.kind(), ErrorKind::TypeConstraint);
    }

    #[test]
    fn language_driver_ids_map_to_labels() {
        assert_eq!(language_driver_label(0x03), Some("windows-1252"));
        assert_eq!(language_driver_label(0xC9), Some("windows-1251"));
        assert_eq!(language_driver_label(0x00), None);
    }
}
