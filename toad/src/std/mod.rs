#![allow(clippy::many_single_char_names)]

use embedded_time::rate::Fraction;

/// Networking! woohoo!
pub mod net;
pub use net::*;

use std::io;
use std::net::UdpSocket;

/// [`crate::platform::PlatformTypes`] configuration for platforms that
/// support `std` (alloc-backed collections, `std::net::UdpSocket`, a
/// wall-clock based [`Clock`]).
pub type PlatformTypes = crate::platform::Alloc<Clock, UdpSocket>;

/// implementor of [`crate::platform::Platform`] for `std`.
///
/// Threads datagrams received on a bound [`UdpSocket`] through `Steps`.
pub type Platform<Steps> = crate::core::Core<PlatformTypes, Steps>;

/// Create a new std runtime bound to `bind_to_addr`
pub fn try_new<A, Steps>(bind_to_addr: A,
                         cfg: crate::config::Config)
                         -> io::Result<Platform<Steps>>
  where A: std::net::ToSocketAddrs,
        Steps: Default
{
  UdpSocket::bind(bind_to_addr).map(|socket| {
                                  crate::core::Core::new_config(cfg, Clock::new(), socket)
                                })
}

/// Implement [`embedded_time::Clock`] using [`std::time`] primitives
#[derive(Debug, Clone, Copy)]
pub struct Clock(std::time::Instant);

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock {
  /// Create a new clock
  pub fn new() -> Self {
    Self(std::time::Instant::now())
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  // microseconds
  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000_000);

  fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
    let now = std::time::Instant::now();
    let elapsed = now.duration_since(self.0);
    Ok(embedded_time::Instant::new(elapsed.as_micros() as u64))
  }
}
