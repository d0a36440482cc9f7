use toad_msg::Message as RawMessage;

use super::{exec_inner_step, Step, StepOutput};
use crate::net::Addrd;
use crate::platform::{self, PlatformTypes};
use crate::req::Req;
use crate::resp::Resp;

/// The message parsing CoAP lifecycle step
///
/// Reads the datagram (if any) from the platform [`Snapshot`](platform::Snapshot)
/// and parses it into a [`Req`] or [`Resp`].
///
/// Parameterized by the step that came before it,
/// most likely this is the [`Empty`](crate::step::Empty) step.
#[derive(Default, Debug, Clone, Copy)]
pub struct Parse<S>(S);

impl<S> Parse<S> {
  /// Create a new Parse step
  pub fn new(s: S) -> Self {
    Self(s)
  }
}

/// Errors that can occur during this step
#[derive(Clone, PartialEq)]
pub enum Error<E> {
  /// Datagram failed to parse as a CoAP message
  Parsing(toad_msg::MessageParseError),
  /// The inner step failed.
  ///
  /// This variant's Debug representation is completely
  /// replaced by the inner type E's debug representation
  Inner(E),
}

impl<E> From<E> for Error<E> {
  fn from(e: E) -> Self {
    Error::Inner(e)
  }
}

impl<E: core::fmt::Debug> core::fmt::Debug for Error<E> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      | Self::Parsing(e) => f.debug_tuple("Parsing").field(e).finish(),
      | Self::Inner(e) => e.fmt(f),
    }
  }
}

impl<E: super::Error> super::Error for Error<E> {}

fn parse<P: PlatformTypes>(snap: &platform::Snapshot<P>) -> nb::Result<platform::Message<P>, toad_msg::MessageParseError> {
  use toad_msg::TryFromBytes;

  match &snap.recvd_dgram {
    | None => Err(nb::Error::WouldBlock),
    | Some(addrd) => RawMessage::try_from_bytes(addrd.data().clone()).map_err(nb::Error::Other),
  }
}

impl<P, Inner, E> Step<P> for Parse<Inner>
  where P: PlatformTypes,
        E: super::Error,
        Inner: Step<P, Error = E>
{
  type PollReq = Addrd<Req<P>>;
  type PollResp = Addrd<Resp<P>>;
  type Error = Error<Inner::Error>;
  type Inner = Inner;

  fn inner(&self) -> &Self::Inner {
    &self.0
  }

  fn poll_req(&self,
              snap: &platform::Snapshot<P>,
              effects: &mut P::Effects)
              -> StepOutput<Self::PollReq, Self::Error> {
    exec_inner_step!(self.0.poll_req(snap, effects), Error::Inner);

    let addr = snap.recvd_dgram.as_ref().map(|a| a.addr());
    Some(parse(snap).map_err(|e| e.map(Error::Parsing))
                     .map(|msg| Addrd(Req::from(msg), addr.unwrap())))
  }

  fn poll_resp(&self,
               snap: &platform::Snapshot<P>,
               effects: &mut P::Effects,
               token: toad_msg::Token,
               addr: no_std_net::SocketAddr)
               -> StepOutput<Self::PollResp, Self::Error> {
    exec_inner_step!(self.0.poll_resp(snap, effects, token, addr), Error::Inner);

    let dgram_addr = snap.recvd_dgram.as_ref().map(|a| a.addr());
    Some(parse(snap).map_err(|e| e.map(Error::Parsing))
                     .map(|msg| Addrd(Resp::from(msg), dgram_addr.unwrap())))
  }
}
