use toad_len::Len;
use toad_map::Map;

use super::catalog::{self, Format};
use super::{OptNumber, OptionMap};

/// Which of the catalog's validation rules to apply. Constructed via
/// [`OptionChecks::all`] for outgoing (serialized) messages or
/// [`OptionChecks::parsed`] for messages just read off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionChecks {
  /// Reject a non-repeatable option that appears more than once.
  pub sequence: bool,
  /// Reject a value whose shape doesn't match the catalog's format for that option.
  pub format: bool,
  /// Reject a value whose length falls outside the catalog's range for that option.
  pub length: bool,
}

impl OptionChecks {
  /// All three checks enabled. The engine runs this before serializing an
  /// outgoing message.
  pub fn all() -> Self {
    Self { sequence: true,
           format: true,
           length: true }
  }

  /// Only format and length checks enabled, with sequence checking disabled.
  /// Option number ordering itself is already guaranteed by the delta
  /// encoding during parsing; this leaves non-repeatable-option duplication
  /// unchecked on messages just read off the wire.
  pub fn parsed() -> Self {
    Self { sequence: false,
           format: true,
           length: true }
  }
}

/// A catalog rule was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CatalogError {
  RepeatedNotAllowed(OptNumber),
  FormatMismatch(OptNumber),
  LengthOutOfRange(OptNumber, usize),
}

fn value_matches_format(format: Format, bytes: &[u8]) -> bool {
  match format {
    | Format::Empty => bytes.is_empty(),
    | Format::Opaque | Format::String => true,
    | Format::Uint => bytes.first().map(|&b| b != 0).unwrap_or(true),
  }
}

/// Validate an option map against the option number catalog, per the
/// flags enabled in `checks`. Options outside the catalog are never
/// rejected by this function.
pub fn validate<M>(opts: &M, checks: OptionChecks) -> Result<(), CatalogError>
  where M: OptionMap
{
  for (&number, values) in opts.iter() {
    let entry = match catalog::lookup(number) {
      | Some(e) => e,
      | None => continue,
    };

    if checks.sequence && !entry.repeatable && values.len() > 1 {
      return Err(CatalogError::RepeatedNotAllowed(number));
    }

    if !(checks.format || checks.length) {
      continue;
    }

    for value in values.iter() {
      let bytes: &[u8] = &value.0;

      if checks.length {
        let len = bytes.len();
        let (min, max) = entry.length;
        if len < min as usize || len > max as usize {
          return Err(CatalogError::LengthOutOfRange(number, len));
        }
      }

      if checks.format && !value_matches_format(entry.format, bytes) {
        return Err(CatalogError::FormatMismatch(number));
      }
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use std_alloc::collections::BTreeMap;
  use std_alloc::vec::Vec;

  use super::*;
  use crate::OptValue;

  #[test]
  fn rejects_repeated_non_repeatable_option() {
    let mut opts = BTreeMap::<OptNumber, Vec<OptValue<Vec<u8>>>>::new();
    opts.insert(OptNumber(12), vec![OptValue(vec![0]), OptValue(vec![1])]);

    assert_eq!(validate(&opts, OptionChecks::all()),
               Err(CatalogError::RepeatedNotAllowed(OptNumber(12))));
  }

  #[test]
  fn rejects_out_of_range_length() {
    let mut opts = BTreeMap::<OptNumber, Vec<OptValue<Vec<u8>>>>::new();
    opts.insert(OptNumber(6), vec![OptValue(vec![0, 0, 0, 0])]);

    assert_eq!(validate(&opts, OptionChecks::all()),
               Err(CatalogError::LengthOutOfRange(OptNumber(6), 4)));
  }

  #[test]
  fn rejects_non_minimal_uint() {
    let mut opts = BTreeMap::<OptNumber, Vec<OptValue<Vec<u8>>>>::new();
    opts.insert(OptNumber(12), vec![OptValue(vec![0, 50])]);

    assert_eq!(validate(&opts, OptionChecks::all()),
               Err(CatalogError::FormatMismatch(OptNumber(12))));
  }

  #[test]
  fn ignores_options_outside_the_catalog() {
    let mut opts = BTreeMap::<OptNumber, Vec<OptValue<Vec<u8>>>>::new();
    opts.insert(OptNumber(65000), vec![OptValue(vec![0; 999])]);

    assert_eq!(validate(&opts, OptionChecks::all()), Ok(()));
  }

  #[test]
  fn accepts_well_formed_options() {
    let mut opts = BTreeMap::<OptNumber, Vec<OptValue<Vec<u8>>>>::new();
    opts.insert(OptNumber(11), vec![OptValue(b"a".to_vec()), OptValue(b"b".to_vec())]);
    opts.insert(OptNumber(12), vec![OptValue(vec![50])]);

    assert_eq!(validate(&opts, OptionChecks::all()), Ok(()));
  }
}
