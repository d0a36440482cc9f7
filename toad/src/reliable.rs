//! Reliable-transport (TCP/WebSocket, RFC 8323) connection and
//! transaction bookkeeping.
//!
//! Unlike the UDP path (see [`crate::step::retry`]), messages on a
//! reliable transport are never retransmitted by this layer — the
//! underlying stream already guarantees delivery and ordering. What's
//! left to track per peer is: the negotiated Capability and Settings
//! Message (CSM) parameters, and a table associating outstanding
//! requests with their callback context until a response arrives or an
//! optional expiration elapses.

use std_alloc::vec::Vec;

use no_std_net::SocketAddr;
use toad_msg::{MessageOptions, OptValue, Token};

use crate::platform::{self, PlatformTypes};

/// Signaling message codes (RFC 8323 §5). Legal only on reliable
/// transport; see [`toad_msg::CodeKind::Signal`].
pub mod signal {
  use toad_msg::Code;

  /// Capability and Settings Message — RFC 8323 §5.3
  pub const CSM: Code = Code::new(7, 1);
  /// Ping — RFC 8323 §5.4
  pub const PING: Code = Code::new(7, 2);
  /// Pong — RFC 8323 §5.4
  pub const PONG: Code = Code::new(7, 3);
  /// Release — RFC 8323 §5.5
  pub const RELEASE: Code = Code::new(7, 4);
  /// Abort — RFC 8323 §5.6
  pub const ABORT: Code = Code::new(7, 5);
}

/// Signaling option numbers. These are contextual: the same number
/// means something different depending on which [`signal`] code it
/// appears on (RFC 8323 §5.2).
pub mod signal_option {
  use toad_msg::OptNumber;

  /// On [`super::signal::CSM`]: the sender's maximum acceptable message size.
  pub const MAX_MESSAGE_SIZE: OptNumber = OptNumber(2);
  /// On [`super::signal::CSM`]: presence indicates block-wise transfer support.
  pub const BLOCK_WISE_TRANSFER: OptNumber = OptNumber(4);
  /// On [`super::signal::PING`]/[`super::signal::PONG`]: an opaque echoed token.
  pub const CUSTODY: OptNumber = OptNumber(2);
  /// On [`super::signal::RELEASE`]: an alternative peer to retry the request against.
  pub const ALTERNATIVE_ADDRESS: OptNumber = OptNumber(2);
  /// On [`super::signal::RELEASE`]: how long to wait before assuming the connection is gone.
  pub const HOLD_OFF: OptNumber = OptNumber(4);
  /// On [`super::signal::ABORT`]: the option number that triggered the abort.
  pub const BAD_CSM_OPTION: OptNumber = OptNumber(2);
}

/// Default `Max-Message-Size`, assumed until a peer's CSM says
/// otherwise (RFC 8323 §5.3.1).
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 1152;

/// One peer's negotiated Capability and Settings.
///
/// Grounded on `transmission/reliable/types.hpp`'s `csm_configure`: a
/// zero incoming `max_message_size` leaves the stored value untouched,
/// and `block_wise_transfer` latches on and never back off once a peer
/// has claimed support for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csm {
  /// The largest message this peer says it will accept.
  pub max_message_size: u32,
  /// Whether this peer supports block-wise transfer (RFC 7959) on this connection.
  pub block_wise_transfer: bool,
}

impl Default for Csm {
  fn default() -> Self {
    Self { max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
           block_wise_transfer: false }
  }
}

impl Csm {
  fn merge(&mut self, max_message_size: Option<u32>, block_wise_transfer: bool) {
    if let Some(size) = max_message_size.filter(|&s| s != 0) {
      self.max_message_size = size;
    }

    if block_wise_transfer {
      self.block_wise_transfer = true;
    }
  }
}

/// Per-peer reliable-transport connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
  addr: SocketAddr,
  csm: Csm,
  /// Set once this connection has received a Release signal: no new
  /// requests should be sent, but in-flight replies still get
  /// processed until the transport itself closes.
  releasing: bool,
}

impl Connection {
  fn new(addr: SocketAddr) -> Self {
    Self { addr, csm: Csm::default(), releasing: false }
  }

  /// The peer's negotiated CSM parameters.
  pub fn csm(&self) -> Csm {
    self.csm
  }

  /// The connection's peer address.
  pub fn addr(&self) -> SocketAddr {
    self.addr
  }

  /// Whether this connection has received a Release signal.
  pub fn is_releasing(&self) -> bool {
    self.releasing
  }
}

/// Table of open reliable connections, one [`Connection`] per peer.
///
/// Grounded on `transmission/reliable/containers/connection.hpp` /
/// `connection_list_vector`: a flat, linearly-searched list of
/// connections, one per open socket.
#[derive(Debug, Default)]
pub struct ConnectionTable {
  connections: Vec<Connection>,
}

impl ConnectionTable {
  /// Create an empty connection table.
  pub fn new() -> Self {
    Self::default()
  }

  /// Open (or re-fetch, if already open) the connection for `addr`.
  pub fn open(&mut self, addr: SocketAddr) -> &mut Connection {
    if let Some(ix) = self.connections.iter().position(|c| c.addr == addr) {
      return &mut self.connections[ix];
    }

    self.connections.push(Connection::new(addr));
    self.connections.last_mut().unwrap()
  }

  /// Look up the connection for `addr`, if open.
  pub fn get(&self, addr: SocketAddr) -> Option<&Connection> {
    self.connections.iter().find(|c| c.addr == addr)
  }

  /// Drop the connection (and by extension every transaction that was
  /// implicitly scoped to it) for `addr`, e.g. on receiving Abort or
  /// the transport closing.
  pub fn close(&mut self, addr: SocketAddr) -> Option<Connection> {
    let ix = self.connections.iter().position(|c| c.addr == addr)?;
    Some(self.connections.remove(ix))
  }

  /// Number of currently-open connections.
  pub fn len(&self) -> usize {
    self.connections.len()
  }

  /// Whether the table has no open connections.
  pub fn is_empty(&self) -> bool {
    self.connections.is_empty()
  }
}

/// Per-message expiration policy for a reliable-transport transaction
/// (spec §4.5; no retransmission timer is involved on this transport).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
  /// Don't allocate a transaction slot at all; any reply routes to the
  /// connection's default callback instead of a specific waiter.
  NoTransaction,
  /// Hold the slot indefinitely until a response arrives or the
  /// connection closes.
  NoExpiration,
  /// Release the slot with [`Status::Timeout`] once `deadline_millis`
  /// (an absolute clock reading) has passed.
  Finite {
    /// Absolute clock reading, in milliseconds, at which this transaction times out.
    deadline_millis: u64,
  },
}

/// Transaction slot status.
///
/// Named identically to the unreliable transaction engine's states
/// (`transmission/types.hpp::status_t`) even though the reliable path
/// never visits `Canceled` via a retry budget — only via an explicit
/// [`TransactionTable::cancel_peer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  /// Slot is free.
  None,
  /// Awaiting a response.
  Sending,
  /// Canceled before a response arrived (peer connection dropped).
  Canceled,
  /// A response was matched.
  Success,
  /// The slot's expiration elapsed before a response arrived.
  Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
  addr: SocketAddr,
  token: Token,
  status: Status,
  expiration: Expiration,
}

/// Table of outstanding reliable-transport transactions.
#[derive(Debug, Default)]
pub struct TransactionTable {
  slots: Vec<Slot>,
}

impl TransactionTable {
  /// Create an empty transaction table.
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a new outstanding request. `Expiration::NoTransaction`
  /// is a deliberate no-op: the spec requires that mode to skip slot
  /// allocation entirely.
  pub fn submit(&mut self, addr: SocketAddr, token: Token, expiration: Expiration) {
    if let Expiration::NoTransaction = expiration {
      return;
    }

    self.slots.push(Slot { addr, token, status: Status::Sending, expiration });
  }

  /// Attempt to match an incoming response to an outstanding
  /// transaction. Returns `true` if a waiting slot was found and
  /// transitioned to [`Status::Success`]; `false` means the reply
  /// should be routed to the connection's default callback.
  pub fn match_response(&mut self, addr: SocketAddr, token: Token) -> bool {
    match self.slots
              .iter_mut()
              .find(|s| s.status == Status::Sending && s.addr == addr && s.token == token)
    {
      | Some(slot) => {
        slot.status = Status::Success;
        true
      },
      | None => false,
    }
  }

  /// Expire any `Finite` slots whose deadline has passed, transitioning
  /// them to [`Status::Timeout`].
  pub fn tick(&mut self, now_millis: u64) {
    for slot in self.slots.iter_mut().filter(|s| s.status == Status::Sending) {
      if let Expiration::Finite { deadline_millis } = slot.expiration {
        if now_millis >= deadline_millis {
          slot.status = Status::Timeout;
        }
      }
    }
  }

  /// Cancel every outstanding transaction for a peer, e.g. because its
  /// connection received Abort or closed.
  pub fn cancel_peer(&mut self, addr: SocketAddr) {
    for slot in self.slots.iter_mut().filter(|s| s.addr == addr) {
      if slot.status == Status::Sending {
        slot.status = Status::Canceled;
      }
    }
  }

  /// Drop every slot that is no longer [`Status::Sending`], freeing
  /// its capacity for reuse.
  pub fn reap(&mut self) {
    self.slots.retain(|s| s.status == Status::Sending);
  }

  /// Number of slots currently awaiting a response.
  pub fn pending(&self) -> usize {
    self.slots.iter().filter(|s| s.status == Status::Sending).count()
  }
}

fn decode_uint(bytes: &[u8]) -> u32 {
  bytes.iter().take(4).fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// What a peer's signaling message asks this connection to do.
#[derive(Debug)]
pub enum SignalAction<P: PlatformTypes> {
  /// Send `0` as an immediate reply (e.g. Pong in answer to Ping).
  Reply(platform::Message<P>),
  /// Drop the connection and every outstanding transaction for it,
  /// without sending a reply.
  Abort,
  /// No reply or connection-level action required, beyond whatever
  /// bookkeeping was already applied to `conn`.
  None,
}

/// Process one inbound signaling message (class 7) against a peer's
/// connection state.
///
/// Grounded on `transmission/reliable/engine_server.hpp` /
/// `engine_client.hpp`'s signal dispatch: CSM updates the stored
/// capabilities, Ping always gets a Pong echoing Custody if present,
/// Pong and Release are handled by the caller's default callback (this
/// function only applies the side effects that are unconditional), and
/// Abort tears the connection down without a reply.
pub fn handle_signal<P: PlatformTypes>(conn: &mut Connection,
                                        msg: &platform::Message<P>)
                                        -> SignalAction<P> {
  match msg.code {
    | c if c == signal::CSM => {
      let unknown_critical = msg.opts.iter().any(|(&num, _)| {
                                      num != signal_option::MAX_MESSAGE_SIZE
                                      && num != signal_option::BLOCK_WISE_TRANSFER
                                      && num.must_be_processed() == toad_msg::OptionMustBeProcessed::Yes
                                    });

      if unknown_critical {
        return SignalAction::Abort;
      }

      let max_message_size =
        msg.get_first(signal_option::MAX_MESSAGE_SIZE).map(|v| decode_uint(&v.0));
      let block_wise_transfer = msg.get_first(signal_option::BLOCK_WISE_TRANSFER).is_some();

      conn.csm.merge(max_message_size, block_wise_transfer);
      SignalAction::None
    },
    | c if c == signal::PING => {
      let mut reply = platform::Message::<P> { id: msg.id,
                                               ty: msg.ty,
                                               ver: msg.ver,
                                               token: msg.token,
                                               code: signal::PONG,
                                               opts: Default::default(),
                                               payload: Default::default() };

      if let Some(custody) = msg.get_first(signal_option::CUSTODY) {
        let value = OptValue(custody.0.iter().copied().collect());
        reply.add(signal_option::CUSTODY, value).ok();
      }

      SignalAction::Reply(reply)
    },
    | c if c == signal::PONG => SignalAction::None,
    | c if c == signal::RELEASE => {
      conn.releasing = true;
      SignalAction::None
    },
    | c if c == signal::ABORT => SignalAction::Abort,
    | _ => SignalAction::None,
  }
}
