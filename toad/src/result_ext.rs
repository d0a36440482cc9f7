//! Extensions to [`Result`] used throughout this crate.
//!
//! Ported from the predecessor crate's `result_ext` module; `toad-common`'s
//! own `result` module (referenced by its `prelude`) was never present in
//! the upstream checkout this repository descends from, so this crate keeps
//! its own copy rather than depending on a module that does not exist.

/// Extensions to Result
pub(crate) trait ResultExt<T, E>: Sized {
  /// Alias for [`Result::and_then`]
  fn bind<R>(self, f: impl FnOnce(T) -> Result<R, E>) -> Result<R, E>;

  /// Allows turning an Err back into Ok by binding on the Err variant
  fn recover<R>(self, f: impl FnOnce(E) -> Result<T, R>) -> Result<T, R>;

  /// Attempt to perform some fallible IO
  fn try_perform(self, f: impl FnOnce(&T) -> Result<(), E>) -> Result<T, E>;

  /// Perform some IO when this Result is Err
  fn perform_err(self, f: impl FnOnce(&E)) -> Result<T, E>;

  /// Perform some IO when this Result is Ok
  fn perform(self, f: impl FnOnce(&T)) -> Result<T, E>;

  /// Perform some IO mutating the data contained in the Ok of this Result
  fn perform_mut(self, f: impl FnOnce(&mut T)) -> Result<T, E>;

  /// Test the data in Ok and turn it into an Err if it doesn't pass a predicate
  fn filter(self, pred: impl FnOnce(&T) -> bool, on_fail: impl FnOnce(&T) -> E) -> Result<T, E>;

  /// Do some fallible IO that resolves in a value and combine Oks
  fn tupled<R>(self, f: impl FnOnce(&T) -> Result<R, E>) -> Result<(T, R), E>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
  fn bind<R>(self, f: impl FnOnce(T) -> Result<R, E>) -> Result<R, E> {
    self.and_then(f)
  }

  fn recover<R>(self, f: impl FnOnce(E) -> Result<T, R>) -> Result<T, R> {
    match self {
      | Ok(t) => Ok(t),
      | Err(e) => f(e),
    }
  }

  fn try_perform(self, f: impl FnOnce(&T) -> Result<(), E>) -> Result<T, E> {
    self.and_then(|t| f(&t).map(|_| t))
  }

  fn perform(self, f: impl FnOnce(&T)) -> Result<T, E> {
    self.map(|t| {
          f(&t);
          t
        })
  }

  fn perform_err(self, f: impl FnOnce(&E)) -> Result<T, E> {
    self.map_err(|e| {
          f(&e);
          e
        })
  }

  fn perform_mut(self, f: impl FnOnce(&mut T)) -> Result<T, E> {
    self.map(|mut t| {
          f(&mut t);
          t
        })
  }

  fn filter(self, pred: impl FnOnce(&T) -> bool, on_fail: impl FnOnce(&T) -> E) -> Result<T, E> {
    self.bind(|t| if pred(&t) { Ok(t) } else { Err(on_fail(&t)) })
  }

  fn tupled<R>(self, f: impl FnOnce(&T) -> Result<R, E>) -> Result<(T, R), E> {
    self.bind(|t| f(&t).map(|r| (t, r)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bind_chains() {
    let r: Result<i32, ()> = Ok(1).bind(|n| Ok(n + 1));
    assert_eq!(r, Ok(2));
  }

  #[test]
  fn recover_converts_err() {
    let r: Result<i32, ()> = Err(()).recover(|_| Ok(9));
    assert_eq!(r, Ok(9));
  }

  #[test]
  fn filter_rejects() {
    let r = Ok(4).filter(|n: &i32| *n > 10, |n| format!("{n} too small"));
    assert_eq!(r, Err("4 too small".to_string()));
  }
}
