use crate::OptNumber;

/// The wire shape of an option's value, as fixed by the option number catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Format {
  Empty,
  Opaque,
  Uint,
  String,
}

/// One row of the option number catalog: whether the option may repeat within
/// a message, what shape its value takes, and the value's valid byte-length range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
  /// Option number this entry describes.
  pub number: OptNumber,
  /// Name, for diagnostics only.
  pub name: &'static str,
  /// Whether this option may appear more than once in a message.
  pub repeatable: bool,
  /// Value format.
  pub format: Format,
  /// Inclusive `(min, max)` value length in bytes.
  pub length: (u16, u16),
}

macro_rules! entry {
  ($n:literal, $name:literal, $repeat:literal, $format:ident, $min:literal ..= $max:literal) => {
    CatalogEntry { number: OptNumber($n),
                   name: $name,
                   repeatable: $repeat,
                   format: Format::$format,
                   length: ($min, $max) }
  };
}

/// Catalog of option numbers defined by core CoAP (RFC7252 §5.10), Observe (RFC7641),
/// block-wise transfer (RFC7959) and the No-Response hint (RFC7967).
///
/// Options whose number is absent from this table are accepted without format,
/// length or repeat validation; only their [`OptNumber`]-derived critical /
/// unsafe-to-forward / no-cache-key properties apply to them.
pub static CATALOG: &[CatalogEntry] = &[entry!(1, "If-Match", true, Opaque, 0..=8),
                                        entry!(3, "Uri-Host", false, String, 1..=255),
                                        entry!(4, "ETag", true, Opaque, 1..=8),
                                        entry!(5, "If-None-Match", false, Empty, 0..=0),
                                        entry!(6, "Observe", false, Uint, 0..=3),
                                        entry!(7, "Uri-Port", false, Uint, 0..=2),
                                        entry!(8, "Location-Path", true, String, 0..=255),
                                        entry!(11, "Uri-Path", true, String, 0..=255),
                                        entry!(12, "Content-Format", false, Uint, 0..=2),
                                        entry!(14, "Max-Age", false, Uint, 0..=4),
                                        entry!(15, "Uri-Query", true, String, 0..=255),
                                        entry!(17, "Accept", false, Uint, 0..=2),
                                        entry!(20, "Location-Query", true, String, 0..=255),
                                        entry!(23, "Block2", false, Uint, 0..=3),
                                        entry!(27, "Block1", false, Uint, 0..=3),
                                        entry!(28, "Size2", false, Uint, 0..=4),
                                        entry!(35, "Proxy-Uri", false, String, 1..=1034),
                                        entry!(39, "Proxy-Scheme", false, String, 1..=255),
                                        entry!(60, "Size1", false, Uint, 0..=4),
                                        entry!(258, "No-Response", false, Uint, 0..=1),];

/// Look up the catalog row for an option number, if this is an option the catalog constrains.
pub fn lookup(number: OptNumber) -> Option<&'static CatalogEntry> {
  CATALOG.iter().find(|e| e.number == number)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn looks_up_known_options() {
    assert_eq!(lookup(OptNumber(11)).unwrap().name, "Uri-Path");
    assert_eq!(lookup(OptNumber(258)).unwrap().format, Format::Uint);
    assert!(lookup(OptNumber(9999)).is_none());
  }
}
