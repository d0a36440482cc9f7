//! Thread-safe mutable memory location usable on `no_std` platforms.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(missing_debug_implementations, unreachable_pub)]
#![deny(unsafe_code, missing_copy_implementations)]
#![deny(missing_docs)]

use core::ops::{Deref, DerefMut};

#[cfg(feature = "std")]
type Inner<T> = std::sync::RwLock<T>;

#[cfg(not(feature = "std"))]
type Inner<T> = core::cell::RefCell<T>;

/// A thread-safe mutable memory location that allows
/// for many concurrent readers or a single writer.
///
/// This is a wrapper of [`std::sync::RwLock`] that
/// switches to [`core::cell::RefCell`] when feature `std`
/// is disabled.
///
/// # Naming
/// "Stem cell" is a pun, since stem cells in biology are
/// defined as cells which can mutate into any other kind
/// of cell, and this data structure changes its shape
/// based on the `std` feature.
#[derive(Debug, Default)]
pub struct Stem<T>(Inner<T>);

impl<T> Stem<T> {
  /// Create a new Stem cell
  pub fn new(t: T) -> Self {
    Self(Inner::new(t))
  }

  /// Call `f` with a shared reference to the contained value.
  ///
  /// # Panics
  /// When feature `std` is disabled, this will panic if invoked
  /// while a call to [`Stem::map_mut`] is already running.
  pub fn map_ref<F, R>(&self, f: F) -> R
    where F: for<'a> FnMut(&'a T) -> R
  {
    self.0.map_ref(f)
  }

  /// Call `f` with a mutable reference to the contained value.
  ///
  /// # Panics
  /// When feature `std` is disabled, this will panic if invoked
  /// while any reference from [`Stem::map_ref`] is outstanding.
  pub fn map_mut<F, R>(&self, f: F) -> R
    where F: for<'a> FnMut(&'a mut T) -> R
  {
    self.0.map_mut(f)
  }
}

/// A mutable memory location.
///
/// Used to back the behavior of [`Stem`], which should be used instead
/// of this trait directly.
pub trait StemCellBehavior<T> {
  /// Create an instance of `Self`
  fn new(t: T) -> Self
    where Self: Sized;

  /// Get a reference to `T` contained in `Self`
  fn map_ref<F, R>(&self, f: F) -> R
    where F: for<'a> FnMut(&'a T) -> R;

  /// Mutate the `T` contained in `Self`
  fn map_mut<F, R>(&self, f: F) -> R
    where F: for<'a> FnMut(&'a mut T) -> R;
}

#[cfg(feature = "std")]
impl<T> StemCellBehavior<T> for std::sync::RwLock<T> {
  fn new(t: T) -> Self {
    Self::new(t)
  }

  fn map_ref<F, R>(&self, mut f: F) -> R
    where F: for<'a> FnMut(&'a T) -> R
  {
    f(self.read().unwrap().deref())
  }

  fn map_mut<F, R>(&self, mut f: F) -> R
    where F: for<'a> FnMut(&'a mut T) -> R
  {
    f(self.write().unwrap().deref_mut())
  }
}

impl<T> StemCellBehavior<T> for core::cell::RefCell<T> {
  fn new(t: T) -> Self {
    Self::new(t)
  }

  fn map_ref<F, R>(&self, mut f: F) -> R
    where F: for<'a> FnMut(&'a T) -> R
  {
    f(self.borrow().deref())
  }

  fn map_mut<F, R>(&self, mut f: F) -> R
    where F: for<'a> FnMut(&'a mut T) -> R
  {
    f(self.borrow_mut().deref_mut())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn map_ref_reads() {
    let s = Stem::new(vec![1, 2, 3]);
    let len = s.map_ref(|v| v.len());
    assert_eq!(len, 3);
  }

  #[test]
  fn map_mut_writes() {
    let s = Stem::new(vec![1, 2, 3]);
    s.map_mut(|v| v.push(4));
    assert_eq!(s.map_ref(|v| v.clone()), vec![1, 2, 3, 4]);
  }
}
