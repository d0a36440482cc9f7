use core::fmt::Write;

use tinyvec::ArrayVec;
use toad_msg::MessageOptions;
use toad_writable::Writable;

use super::{Step, StepOutput};
use crate::net::Addrd;
use crate::platform;
use crate::platform::PlatformTypes;
use crate::req::Req;
use crate::resp::Resp;

/// Struct responsible for buffering and yielding responses to the request
/// we're polling for.
///
/// For more information, see the [module documentation](crate::step::buffer_responses).
#[derive(Debug)]
pub struct SetStandardOptions<S>(S);

impl<S> Default for SetStandardOptions<S> where S: Default
{
  fn default() -> Self {
    Self(S::default())
  }
}

impl<P, E, S> Step<P> for SetStandardOptions<S>
  where P: PlatformTypes,
        E: super::Error,
        S: Step<P, PollReq = Addrd<Req<P>>, PollResp = Addrd<Resp<P>>, Error = E>
{
  type PollReq = Addrd<Req<P>>;
  type PollResp = Addrd<Resp<P>>;
  type Error = E;
  type Inner = S;

  fn inner(&self) -> &S {
    &self.0
  }

  fn poll_req(&self,
              snap: &crate::platform::Snapshot<P>,
              effects: &mut <P as PlatformTypes>::Effects)
              -> StepOutput<Self::PollReq, Self::Error> {
    self.0.poll_req(snap, effects)
  }

  fn poll_resp(&self,
               snap: &crate::platform::Snapshot<P>,
               effects: &mut <P as PlatformTypes>::Effects,
               token: toad_msg::Token,
               addr: no_std_net::SocketAddr)
               -> StepOutput<Self::PollResp, Self::Error> {
    self.0.poll_resp(snap, effects, token, addr)
  }

  fn before_message_sent(&self,
                         snap: &platform::Snapshot<P>,
                         effs: &mut P::Effects,
                         msg: &mut Addrd<platform::Message<P>>)
                         -> Result<(), Self::Error> {
    self.0.before_message_sent(snap, effs, msg)?;

    let (host, port) = (msg.addr().ip(), msg.addr().port());

    let mut bytes = Writable::<ArrayVec<[u8; 4]>>::default();
    write!(bytes, "{}", host).ok();
    msg.as_mut().set_host(bytes.as_str()).ok();
    msg.as_mut().set_port(port).ok();

    Ok(())
  }
}
