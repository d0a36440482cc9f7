use std_alloc::vec::Vec;

use no_std_net::SocketAddr;
use toad_msg::{MessageOptions, OptValue, Token};

use crate::net::Addrd;
use crate::platform::PlatformTypes;
use crate::req::Req;
use crate::resp::Resp;
use crate::time::Clock;

/// One subscriber to a resource: the peer and token to notify, and the
/// sequence number of the last notification sent to them.
///
/// Grounded on `observe::observer` in the reference implementation,
/// which stores exactly `(endpoint, token, format)` per subscriber;
/// `last_sequence` and `last_sent_at` are added here since notification
/// freshness (RFC 7641 §3.4) is this project's responsibility, not the
/// reference's (it never implements the comparator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Subscriber {
  addr: SocketAddr,
  token: Token,
  last_sequence: u32,
  last_sent_at_secs: u64,
}

/// Fixed 24-bit wraparound sequence counter used to stamp Observe
/// notifications (RFC 7641 §4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sequence(u32);

impl Sequence {
  const MASK: u32 = 0x00FF_FFFF;

  /// Produce the next sequence number in the 24-bit cycle.
  pub fn next(self) -> Self {
    Sequence(self.0.wrapping_add(1) & Self::MASK)
  }

  /// The current numeric value.
  pub fn value(self) -> u32 {
    self.0
  }

  /// RFC 7641 §3.4 freshness comparator: is `v2` (at time `t2`) fresher
  /// than `v1` (at time `t1`)?
  ///
  /// `t1`/`t2` are seconds since an arbitrary epoch (only their
  /// difference matters).
  pub fn is_fresher(v1: u32, t1: u64, v2: u32, t2: u64) -> bool {
    let v1 = v1 & Self::MASK;
    let v2 = v2 & Self::MASK;

    let forward_no_wrap = v1 < v2 && v2 - v1 < (1 << 23);
    let forward_wrapped = v1 > v2 && v1 - v2 > (1 << 23);
    let stale_window = t2 > t1 + 128;

    forward_no_wrap || forward_wrapped || stale_window
  }

  /// Encode this sequence number as the minimal big-endian byte
  /// sequence CoAP's `uint` option format requires (0 bytes for 0, up
  /// to 3 bytes otherwise, since the value is always < 2^24).
  pub fn to_option_bytes(self) -> Vec<u8> {
    let bytes = self.0.to_be_bytes();
    match bytes.iter().position(|&b| b != 0) {
      | None => Vec::new(),
      | Some(start) => bytes[start..].to_vec(),
    }
  }

  /// Decode a sequence number from the raw bytes of an inbound Observe
  /// option value (0 to 3 bytes, big-endian).
  pub fn from_option_bytes(bytes: &[u8]) -> Self {
    let mut v: u32 = 0;
    for &b in bytes.iter().take(3) {
      v = (v << 8) | b as u32;
    }
    Sequence(v & Self::MASK)
  }
}

/// A registry of observers for a single resource, tracked by
/// `(peer, token)`.
///
/// Grounded on `observe::list_vector` (a flat `Vec` searched linearly
/// on every operation, used by the reference's non-constrained
/// profile); the constrained, fixed-capacity `observe::list` variant is
/// not reproduced since this project's `alloc`-only resource layer
/// already mirrors `platform::Alloc`'s own Vec-backed collections.
#[derive(Debug, Default)]
pub struct Registry {
  subscribers: Vec<Subscriber>,
  sequence: Sequence,
}

impl Registry {
  /// Create an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of currently-registered observers.
  pub fn len(&self) -> usize {
    self.subscribers.len()
  }

  /// Whether the registry has no observers.
  pub fn is_empty(&self) -> bool {
    self.subscribers.is_empty()
  }

  /// Inspect an incoming request's Observe option (if any) and update
  /// the registry accordingly: value `0` registers the requester as an
  /// observer, value `1` deregisters them. Requests without an Observe
  /// option leave the registry untouched.
  pub fn process<P: PlatformTypes>(&mut self, peer: SocketAddr, req: &Req<P>) {
    let opt = req.get_option(toad_msg::opt::known::no_repeat::OBSERVE);
    let value = match opt.and_then(|v| v.get(0)) {
      | Some(ov) => &ov.0,
      | None => return,
    };

    match value.first() {
      | Some(0) => self.add(peer, req.msg().token),
      | _ => self.remove(peer, req.msg().token),
    }
  }

  fn add(&mut self, addr: SocketAddr, token: Token) {
    if let Some(sub) = self.subscribers
                            .iter_mut()
                            .find(|s| s.addr == addr && s.token == token)
    {
      sub.last_sequence = self.sequence.value();
      return;
    }

    self.subscribers.push(Subscriber { addr,
                                       token,
                                       last_sequence: self.sequence.value(),
                                       last_sent_at_secs: 0 });
  }

  fn remove(&mut self, addr: SocketAddr, token: Token) {
    self.subscribers.retain(|s| !(s.addr == addr && s.token == token));
  }

  /// Drop every subscription for a single peer (e.g. on connection
  /// close for a reliable-transport peer).
  pub fn cancel_peer(&mut self, addr: SocketAddr) {
    self.subscribers.retain(|s| s.addr != addr);
  }

  /// Drop all subscriptions.
  pub fn cancel_all(&mut self) {
    self.subscribers.clear();
  }

  /// Build one notification per registered observer for a changed
  /// resource representation, advancing and stamping the shared
  /// sequence counter. `build` fills in the code/payload of each
  /// per-observer response (already carrying the observer's token and
  /// a NON message envelope).
  pub fn notify<P, C, F>(&mut self, clock: &C, mut build: F) -> Vec<Addrd<Resp<P>>>
    where P: PlatformTypes,
          C: Clock,
          F: FnMut(&mut Resp<P>)
  {
    use embedded_time::duration::Milliseconds;
    use embedded_time::Clock as _;

    self.sequence = self.sequence.next();
    let now_secs = clock.try_now()
                        .ok()
                        .and_then(|i| Milliseconds::<u64>::try_from(i.duration_since_epoch()).ok())
                        .map(|m| m.0 / 1000)
                        .unwrap_or(0);

    self.subscribers
        .iter_mut()
        .map(|sub| {
          sub.last_sequence = self.sequence.value();
          sub.last_sent_at_secs = now_secs;

          let mut resp = Resp::<P>::notification(sub.token);
          resp.msg_mut()
              .set(toad_msg::opt::known::no_repeat::OBSERVE,
                   OptValue(self.sequence
                                .to_option_bytes()
                                .into_iter()
                                .collect()))
              .ok();
          build(&mut resp);

          Addrd(resp, sub.addr)
        })
        .collect()
  }
}
