use embedded_time::Instant;
use toad_msg::{CodeKind, Token};

use super::{exec_inner_step, Step, StepOutput};
use crate::net::Addrd;
use crate::platform::{self, PlatformTypes};
use crate::req::Req;
use crate::resp::Resp;
use crate::time;

/// Errors that can be encountered when provisioning tokens
#[derive(Debug, PartialEq, PartialOrd, Clone, Copy)]
pub enum Error<E> {
  /// The inner step failed.
  ///
  /// This variant's Debug representation is completely
  /// replaced by the inner type E's debug representation.
  Inner(E),
  /// This exceedingly rare error will only ever happen
  /// when the [`Clock`](crate::time::Clock) implementation
  /// is defined as 1 tick meaning 1 second.
  ///
  /// If this is the case, it would be highly advised to use
  /// milli ticks, as seconds are too granular to be reliable
  /// for timings used in `toad`.
  MillisSinceEpochWouldOverflow,
}

impl<E> super::Error for Error<E> where E: super::Error {}

impl<E> From<E> for Error<E> {
  fn from(e: E) -> Self {
    Error::Inner(e)
  }
}

/// Step responsible for replacing all message tokens of zero `Token([])`
/// (assumed to be meaningless) with a new token unique to this moment in
/// time.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionTokens<S>(S);

impl<S: Default> Default for ProvisionTokens<S> {
  fn default() -> Self {
    Self(Default::default())
  }
}

impl<S> ProvisionTokens<S> {
  /// Create a new ProvisionTokens step
  pub fn new(s: S) -> Self {
    Self(s)
  }

  fn next<E, Clock>(now: Instant<Clock>, cfg: crate::config::Config) -> Result<Token, Error<E>>
    where Clock: time::Clock
  {
    let now_since_epoch =
      time::Millis::try_from(now.duration_since_epoch()).map_err(|_| {
                                                            Error::MillisSinceEpochWouldOverflow
                                                          })?;

    #[allow(clippy::many_single_char_names)]
    let bytes = {
      let ([a, b], [c, d, e, f, g, h, i, j]) =
        (cfg.msg.token_seed.to_be_bytes(), now_since_epoch.0.to_be_bytes());
      [a, b, c, d, e, f, g, h, i, j]
    };

    Ok(Token::opaque(&bytes))
  }
}

impl<P, E, S> Step<P> for ProvisionTokens<S>
  where P: PlatformTypes,
        E: super::Error,
        S: Step<P, PollReq = Addrd<Req<P>>, PollResp = Addrd<Resp<P>>, Error = E>
{
  type PollReq = Addrd<Req<P>>;
  type PollResp = Addrd<Resp<P>>;
  type Error = Error<E>;
  type Inner = S;

  fn inner(&self) -> &S {
    &self.0
  }

  fn poll_req(&self,
              snap: &platform::Snapshot<P>,
              effects: &mut P::Effects)
              -> StepOutput<Self::PollReq, Self::Error> {
    let out = exec_inner_step!(self.0.poll_req(snap, effects), Error::Inner);
    Some(Ok(out))
  }

  fn poll_resp(&self,
               snap: &platform::Snapshot<P>,
               effects: &mut P::Effects,
               token: Token,
               addr: no_std_net::SocketAddr)
               -> StepOutput<Self::PollResp, Self::Error> {
    let out = exec_inner_step!(self.0.poll_resp(snap, effects, token, addr), Error::Inner);
    Some(Ok(out))
  }

  fn before_message_sent(&self,
                         snap: &platform::Snapshot<P>,
                         effects: &mut P::Effects,
                         msg: &mut Addrd<platform::Message<P>>)
                         -> Result<(), Self::Error> {
    self.0.before_message_sent(snap, effects, msg)?;

    let token = match (msg.data().code.kind(), msg.data().token) {
      | (CodeKind::Request, t) if t == Token(Default::default()) => {
        Self::next(snap.time, snap.config)?
      },
      | (_, t) => t,
    };

    msg.data_mut().token = token;

    Ok(())
  }
}

#[cfg(test)]
mod test {
  use toad_msg::Token;

  use super::*;
  use crate::config::Config;
  use crate::net::Addrd;
  use crate::step::test::test_step;
  use crate::test::{ClockMock, Snapshot};

  type InnerPollReq = Addrd<Req<crate::test::Platform>>;
  type InnerPollResp = Addrd<Resp<crate::test::Platform>>;

  test_step!(
    GIVEN ProvisionTokens::<Dummy> where Dummy: {Step<PollReq = InnerPollReq, PollResp = InnerPollResp, Error = ()>};
    WHEN inner_errors [
      (inner.poll_req => { Some(Err(nb::Error::Other(()))) }),
      (inner.poll_resp => { Some(Err(nb::Error::Other(()))) })
    ]
    THEN this_should_error [
      (poll_req(_, _) should satisfy { |out| assert_eq!(out, Some(Err(nb::Error::Other(Error::Inner(()))))) }),
      (poll_resp(_, _, _, _) should satisfy { |out| assert_eq!(out, Some(Err(nb::Error::Other(Error::Inner(()))))) })
    ]
  );

  test_step!(
    GIVEN ProvisionTokens::<Dummy> where Dummy: {Step<PollReq = InnerPollReq, PollResp = InnerPollResp, Error = ()>};
    WHEN inner_blocks [
      (inner.poll_req => { Some(Err(nb::Error::WouldBlock)) }),
      (inner.poll_resp => { Some(Err(nb::Error::WouldBlock)) })
    ]
    THEN this_should_block [
      (poll_req(_, _) should satisfy { |out| assert_eq!(out, Some(Err(nb::Error::WouldBlock))) }),
      (poll_resp(_, _, _, _) should satisfy { |out| assert_eq!(out, Some(Err(nb::Error::WouldBlock))) })
    ]
  );

  test_step!(
    GIVEN ProvisionTokens::<Dummy> where Dummy: {Step<PollReq = InnerPollReq, PollResp = InnerPollResp, Error = ()>};
    WHEN we_boutta_send_a_request [
      (inner.before_message_sent = { |_, _| Ok(()) })
    ]
    THEN this_should_make_sure_it_has_a_token [
      (before_message_sent(
          Snapshot { time: ClockMock::instant(0),
                     recvd_dgram: Some(Addrd(Default::default(), crate::test::dummy_addr())),
                     config: Config::default() },
          crate::test::msg!(CON GET x.x.x.x:80)
      ) should satisfy { |m: Addrd<crate::test::Message>| assert_ne!(m.data().token, Token(Default::default())) })
    ]
  );

  test_step!(
    GIVEN ProvisionTokens::<Dummy> where Dummy: {Step<PollReq = InnerPollReq, PollResp = InnerPollResp, Error = ()>};
    WHEN we_boutta_send_a_response [
      (inner.before_message_sent = { |_, _| Ok(()) })
    ]
    THEN this_should_not_touch_it [
      (before_message_sent(
          Snapshot { time: ClockMock::instant(0),
                     recvd_dgram: Some(Addrd(Default::default(), crate::test::dummy_addr())),
                     config: Config::default() },
          crate::test::msg!(ACK {2 . 04} x.x.x.x:80)
      ) should satisfy { |m: Addrd<crate::test::Message>| assert_eq!(m.data().token, Token(Default::default())) })
    ]
  );
}
