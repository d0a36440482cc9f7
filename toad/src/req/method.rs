use toad_msg::Code;

use crate::code;

/// A CoAP request method (RFC 7252 §5.8).
///
/// Wraps the underlying request [`Code`] (always class `0`, nonzero detail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Method(pub(crate) Code);

impl Default for Method {
  fn default() -> Self {
    Self::GET
  }
}

impl Method {
  /// Get the underlying [`Code`] for this method
  pub fn code(&self) -> Code {
    self.0
  }

  code!(rfc7252("5.8.1") GET = Method(0*01));
  code!(rfc7252("5.8.2") POST = Method(0*02));
  code!(rfc7252("5.8.3") PUT = Method(0*03));
  code!(rfc7252("5.8.4") DELETE = Method(0*04));
}
