use no_std_net::SocketAddr;

use crate::config::Config;
use crate::net::Socket;
use crate::platform::{self, PlatformError, PlatformTypes};
use crate::req::Req;
use crate::resp::Resp;
use crate::step::Step;

/// DTLS mode
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Secure {
  /// Opt in to DTLS, if platform supports it
  IfSupported,
  /// Explicitly opt out of DTLS
  #[allow(dead_code)]
  No,
}

/// The runtime struct that drives client- and server-side behavior by
/// threading datagrams through a chain of [`Step`]s.
///
/// `Core` is a bring-your-own-platform implementor of
/// [`platform::Platform`]; everything it does beyond owning the clock,
/// socket and config is delegated to `Steps` (id/token provisioning,
/// ACK bookkeeping, retries, block-wise reassembly, ...).
#[allow(missing_debug_implementations)]
pub struct Core<P: PlatformTypes, Steps> {
  steps: Steps,
  config: Config,
  sock: P::Socket,
  clock: P::Clock,
}

impl<P: PlatformTypes, Steps: Default> Core<P, Steps> {
  /// Creates a new Core with the default runtime behavior
  pub fn new(clock: P::Clock, sock: P::Socket) -> Self {
    Self::new_config(Config::default(), clock, sock)
  }

  /// Create a new core with custom runtime behavior
  pub fn new_config(config: Config, clock: P::Clock, sock: P::Socket) -> Self {
    Self { steps: Steps::default(),
           config,
           sock,
           clock }
  }
}

impl<P, Steps> platform::Platform<Steps> for Core<P, Steps>
  where P: PlatformTypes,
        Steps: Step<P, PollReq = crate::net::Addrd<Req<P>>, PollResp = crate::net::Addrd<Resp<P>>>
{
  type Types = P;
  type Error = Error<P, Steps::Error, <P::Socket as Socket>::Error>;

  fn log(&self, level: log::Level, msg: crate::todo::String<1000>) -> Result<(), Self::Error> {
    log::log!(target: "toad", level, "{}", msg.as_str());
    Ok(())
  }

  fn config(&self) -> Config {
    self.config
  }

  fn steps(&self) -> &Steps {
    &self.steps
  }

  fn socket(&self) -> &P::Socket {
    &self.sock
  }

  fn clock(&self) -> &P::Clock {
    &self.clock
  }
}

/// Default [`PlatformError`] implementation used by [`Core`]
#[derive(Debug)]
#[allow(missing_docs)]
pub enum Error<P: PlatformTypes, StepError, SocketError> {
  MessageToBytes(::toad_msg::to_bytes::MessageToBytesError),
  Step(StepError),
  Socket(SocketError),
  Clock(embedded_time::clock::Error),
  _Platform(core::marker::PhantomData<P>),
}

impl<P, StepError, SocketError> PlatformError<StepError, SocketError> for Error<P, StepError, SocketError>
  where P: PlatformTypes,
        StepError: core::fmt::Debug,
        SocketError: core::fmt::Debug
{
  fn msg_to_bytes(e: ::toad_msg::to_bytes::MessageToBytesError) -> Self {
    Self::MessageToBytes(e)
  }

  fn step(e: StepError) -> Self {
    Self::Step(e)
  }

  fn socket(e: SocketError) -> Self {
    Self::Socket(e)
  }

  fn clock(e: embedded_time::clock::Error) -> Self {
    Self::Clock(e)
  }
}

/// Resolve a hostname/address string + port into a [`SocketAddr`]
pub(crate) fn resolve_addr(host: impl AsRef<str>, port: u16) -> Option<SocketAddr> {
  use no_std_net::IpAddr;
  host.as_ref().parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, port))
}
