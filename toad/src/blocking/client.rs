use no_std_net::SocketAddr;
use toad_msg::{Code, Token, Type};

use crate::config::Config;
use crate::core::Core;
use crate::net::{Addrd, Socket};
use crate::platform::{self, Platform, PlatformTypes};
use crate::req::{Req, ReqBuilder};
use crate::resp::{code, Resp};
use crate::result_ext::ResultExt;
use crate::step::Step;

/// Platform struct containing things needed to make a new Client.
///
/// This is used for bring-your-own platform use cases, like embedded.
#[derive(Clone, Debug)]
pub struct ClientConfig<Clock, Socket> {
  /// The clock that the toad runtime will use
  /// to keep track of time.
  pub clock: Clock,
  /// The network abstraction that the toad runtime
  /// will use to interact with the network.
  pub sock: Socket,
}

/// A blocking CoAP request client
///
/// Generic over `P` (the [`PlatformTypes`] in use) and `Steps`
/// (the chain of [`Step`]s that provision ids/tokens, retry unacked
/// CON messages, and reassemble block-wise transfers).
#[allow(missing_debug_implementations)]
pub struct Client<P: PlatformTypes, Steps> {
  core: Core<P, Steps>,
}

impl<P, Steps> Client<P, Steps>
  where P: PlatformTypes,
        Steps: Step<P, PollReq = Addrd<Req<P>>, PollResp = Addrd<Resp<P>>> + Default
{
  /// Create a new request client
  pub fn new(ClientConfig { clock, sock }: ClientConfig<P::Clock, P::Socket>) -> Self {
    Self { core: Core::new(clock, sock) }
  }

  /// Create a new request client with a specific runtime config
  pub fn new_config(config: Config,
                    ClientConfig { clock, sock }: ClientConfig<P::Clock, P::Socket>)
                    -> Self {
    Self { core: Core::new_config(config, clock, sock) }
  }

  /// Ping an endpoint
  ///
  /// Sends an empty CONfirmable message; per the CoAP spec a peer that
  /// recognizes the message id should answer with a RST.
  pub fn ping(&mut self,
              host: impl AsRef<str>,
              port: u16)
              -> Result<(), <Core<P, Steps> as Platform<Steps>>::Error> {
    let addr = crate::core::resolve_addr(host, port).expect("invalid host");

    let msg = platform::Message::<P> { ver: Default::default(),
                                       ty: Type::Con,
                                       id: toad_msg::Id(0),
                                       code: Code::new(0, 0),
                                       token: Token(Default::default()),
                                       payload: toad_msg::Payload(Default::default()),
                                       opts: Default::default() };

    nb::block!(self.core.send_msg(Addrd(msg, addr))).map(|_| ())
  }

  /// Send a request to `addr`
  pub fn send(&mut self,
              addr: SocketAddr,
              req: Req<P>)
              -> Result<Resp<P>, <Core<P, Steps> as Platform<Steps>>::Error> {
    let msg: platform::Message<P> = req.into();

    nb::block!(self.core.send_msg(Addrd(msg, addr))).bind(|(_, token)| {
                                                       nb::block!(self.core
                                                                      .poll_resp(token, addr))
                                                     })
  }

  /// Send a GET request
  pub fn get(path: impl AsRef<str>) -> ReqBuilder<P> {
    ReqBuilder::get(path)
  }

  /// Drain and reject any inbound requests.
  ///
  /// A client-only endpoint has no resource tree to dispatch requests
  /// against; per RFC 7252 §5.9.2.9, any request it receives gets a
  /// uniform 5.01 Not Implemented reply.
  pub fn reject_requests(&mut self) -> Result<(), <Core<P, Steps> as Platform<Steps>>::Error> {
    loop {
      let Addrd(req, addr) = match self.core.poll_req() {
        | Ok(addrd_req) => addrd_req,
        | Err(nb::Error::WouldBlock) => return Ok(()),
        | Err(nb::Error::Other(e)) => return Err(e),
      };

      if let Some(mut resp) = Resp::for_request(&req) {
        resp.set_code(code::NOT_IMPLEMENTED);
        nb::block!(self.core.send_msg(Addrd(resp.into(), addr))).map(|_| ())?;
      }
    }
  }
}
