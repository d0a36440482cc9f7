use core::convert::Infallible;

use no_std_net::SocketAddr;
use toad_msg::Token;

use crate::net::Addrd;
use crate::platform::{self, PlatformTypes};

/// # ACKing incoming messages
///
/// This step will send empty ACK messages to
/// all received CON messages (applies to both server & client flows)
pub mod ack;

/// # Buffering Responses
///
/// This step module only applies to the client flow.
///
/// [`BufferResponses`](buffer_responses::alloc::BufferResponses) ([`no_alloc`](buffer_responses::no_alloc::BufferResponses))
/// handles responses received during the client flow (polling for a response to a sent request)
///
/// If the response gotten matches the token of the sent request, nothing is done and
/// the next step will get the response.
///
/// If the response does not match the request token, and it has not seen a response to this
/// request yet, then the response is stored in the buffer and `WouldBlock` is yielded.
///
/// If the response does not match the request token, and it has buffered a response to this
/// request, then the response is stored in the buffer and the matching response is taken out of the buffer.
pub mod buffer_responses;

/// # Block-wise transfer
///
/// Reassembles multipart Block1/Block2 exchanges into a single request or response,
/// and splits outbound messages too large to fit in one datagram.
pub mod block;

/// # Acking incoming requests, tracking outgoing CON messages awaiting an ACK
pub mod handle_acks;

/// # Parsing step
///
/// This step is responsible for initiating the Step pipe
/// by reading the platform's [`Snapshot`](crate::platform::Snapshot) for
/// a dgram received from an external source.
///
/// This step does no filtering whatsoever and _just_ parses the dgram
/// into a [`toad_msg::Message`] then into a [`Req`](crate::req::Req) or [`Resp`](crate::resp::Resp).
pub mod parse;

/// # Provisioning message ids
pub mod provision_ids;

/// # Provisioning tokens
pub mod provision_tokens;

/// # Observing resources
///
/// Client-side request deduplication used to recognize retransmitted
/// `GET ... Observe: 0` requests.
pub mod observe;

/// # Resetting unrecognized messages
pub mod reset;

/// # Retrying unacknowledged CON messages
pub mod retry;

/// # Standard options
///
/// Sets options that should be present on every outbound message
/// (currently: Uri-Host, Uri-Port).
pub mod set_standard_options;

/// ```text
///             None -> "You may run, the step may have done nothing or just performed some effects"
///         Some(Ok) -> "You may run, the step yielded a T that could be transformed or discarded"
///        Some(Err) -> "You should not run, something unrecoverable happened"
/// Some(WouldBlock) -> "You may run, but we should all wait until the resource would no longer block"
/// ```
pub type StepOutput<T, E> = Option<nb::Result<T, E>>;

/// Macro to execute inner steps,
/// converting the `Option<nb::Result<T, E>>` to `Option<T>`
/// by returning the inner step's Errors & WouldBlock
#[macro_export]
macro_rules! exec_inner_step {
  ($result:expr, $err:expr) => {
    exec_inner_step!(run_anyway_when_would_block = false, $result, $err)
  };
  (run_anyway_when_would_block = $run_anyway_when_would_block:expr, $result:expr, $err:expr) => {
    match $result {
      | None => None,
      | Some(Ok(t)) => Some(t),
      | Some(Err(nb::Error::WouldBlock)) if $run_anyway_when_would_block => None,
      | Some(Err(nb::Error::WouldBlock)) => return Some(Err(nb::Error::WouldBlock)),
      | Some(Err(nb::Error::Other(e))) => return Some(Err(nb::Error::Other($err(e)))),
    }
  };
}

pub use exec_inner_step;

/// An error that can be returned by a [`Step`].
pub trait Error: core::fmt::Debug {}

impl Error for Infallible {}
impl Error for () {}

/// An [`Error`] that just passes an inner step's error
/// through, for steps that are infallible but wrap fallible
/// steps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PassThrough<E>(pub E);

impl<E: core::fmt::Debug> core::fmt::Debug for PassThrough<E> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    self.0.fmt(f)
  }
}

impl<E: Error> Error for PassThrough<E> {}

/// A step in the message-handling CoAP runtime.
///
/// Steps are arranged in a chain, each wrapping the one before it
/// (see [`Empty`], the step that every chain eventually bottoms out at).
/// A step only needs to override the hooks it cares about; the others
/// are expected to delegate to [`Step::inner`].
///
/// See the [module documentation](crate::step) for more.
pub trait Step<P: PlatformTypes>: Default {
  /// Type that this step returns when polling for a request
  type PollReq;

  /// Type that this step returns when polling for a response
  type PollResp;

  /// Type of error that can be yielded by poll_req / poll_resp
  type Error: Error;

  /// The step that this step wraps
  type Inner;

  /// Obtain a reference to the wrapped step
  fn inner(&self) -> &Self::Inner;

  /// Poll for an inbound request
  ///
  /// (A message which we have no existing conception of)
  fn poll_req(&self,
              snap: &platform::Snapshot<P>,
              effects: &mut P::Effects)
              -> StepOutput<Self::PollReq, Self::Error>;

  /// Poll for an inbound response
  ///
  /// (A message which we are expecting as a direct result of a message we sent)
  fn poll_resp(&self,
               snap: &platform::Snapshot<P>,
               effects: &mut P::Effects,
               token: Token,
               addr: SocketAddr)
               -> StepOutput<Self::PollResp, Self::Error>;

  /// Called just before a message is serialized and placed on the wire.
  ///
  /// Steps that need to stamp standard fields (id, token, options) hook in here.
  fn before_message_sent(&self,
                         snap: &platform::Snapshot<P>,
                         effects: &mut P::Effects,
                         msg: &mut Addrd<platform::Message<P>>)
                         -> Result<(), Self::Error> {
    let _ = (snap, effects, msg);
    Ok(())
  }

  /// Called just after a message has been placed on the wire.
  ///
  /// Steps that need to remember outbound CON messages (for retry, ACK tracking) hook in here.
  fn on_message_sent(&self,
                     snap: &platform::Snapshot<P>,
                     effects: &mut P::Effects,
                     msg: &Addrd<platform::Message<P>>)
                     -> Result<(), Self::Error> {
    let _ = (snap, effects, msg);
    Ok(())
  }

  /// A representation of `path` has changed and subscribers should be told.
  ///
  /// Only the Observe-aware step in the chain does anything with this;
  /// everything else passes it through.
  fn notify<Path: AsRef<str> + Clone>(&self,
                                      path: Path,
                                      effects: &mut P::Effects)
                                      -> Result<(), Self::Error> {
    let _ = (path, effects);
    Ok(())
  }
}

/// A step that does nothing
///
/// This step is usually at the bottom / beginning of step chains.
///
/// e.g.
/// ```text
/// FilterResponses<AckRequests<Parse<Empty>>>
/// ```
/// means
/// ```text
/// Do nothing
/// then Parse datagrams
/// then Ack requests
/// then Filter responses
/// ```
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Empty;

impl<P: PlatformTypes> Step<P> for Empty {
  type PollReq = ();
  type PollResp = ();
  type Error = Infallible;
  type Inner = ();

  fn inner(&self) -> &() {
    &()
  }

  fn poll_req(&self, _: &platform::Snapshot<P>, _: &mut P::Effects) -> StepOutput<(), Infallible> {
    None
  }

  fn poll_resp(&self,
               _: &platform::Snapshot<P>,
               _: &mut P::Effects,
               _: Token,
               _: SocketAddr)
               -> StepOutput<(), Infallible> {
    None
  }
}

#[cfg(test)]
pub mod test {
  use embedded_time::Clock;

  use super::*;
  use crate::test;
  use crate::test::ClockMock;

  pub fn default_snapshot() -> platform::Snapshot<test::Platform> {
    platform::Snapshot { time: ClockMock::new().try_now().unwrap(),
                         recvd_dgram: Some(crate::net::Addrd(Default::default(),
                                                             crate::test::dummy_addr())),
                         config: Default::default() }
  }
}
