use embedded_time::duration::Milliseconds;
use embedded_time::Clock as _;
use no_std_net::SocketAddr;
use std_alloc::vec::Vec;
use toad_msg::{Id, Token};

use crate::config::Config;
use crate::core::Core;
use crate::net::{Addrd, Socket};
use crate::platform::{self, Platform, PlatformTypes};
use crate::req::Req;
use crate::reliable;
use crate::resp::Resp;
use crate::server::observe;
use crate::server::resource::{SeparateResponseHandle, Tree};
use crate::step::Step;

/// Platform struct containing things needed to make a new Server.
///
/// This is used for bring-your-own platform use cases, like embedded.
#[derive(Clone, Debug)]
pub struct ServerConfig<Clock, Socket> {
  /// The clock that the toad runtime will use
  /// to keep track of time.
  pub clock: Clock,
  /// The network abstraction that the toad runtime
  /// will use to listen for and respond to requests.
  pub sock: Socket,
}

/// A blocking CoAP server.
///
/// Owns a resource [`Tree`] to dispatch requests against, an
/// [`observe::Registry`] of subscribers to notify on resource changes,
/// and (for transports where it's meaningful) a table of reliable-transport
/// connections (see [`reliable`]).
///
/// Generic over `P` (the [`PlatformTypes`] in use) and `Steps`
/// (the chain of [`Step`]s that provision ids/tokens, ack requests, and
/// reassemble block-wise transfers).
#[allow(missing_debug_implementations)]
pub struct Server<P: PlatformTypes, Steps> {
  core: Core<P, Steps>,
  resources: Tree<P>,
  observers: observe::Registry,
  connections: reliable::ConnectionTable,
  transactions: reliable::TransactionTable,
  separate: Vec<SeparateResponseHandle>,
}

impl<P, Steps> Server<P, Steps>
  where P: PlatformTypes,
        Steps: Step<P, PollReq = Addrd<Req<P>>, PollResp = Addrd<crate::resp::Resp<P>>> + Default
{
  /// Create a new server with an empty resource tree.
  pub fn new(ServerConfig { clock, sock }: ServerConfig<P::Clock, P::Socket>) -> Self {
    Self { core: Core::new(clock, sock),
           resources: Tree::new(),
           observers: observe::Registry::new(),
           connections: reliable::ConnectionTable::new(),
           transactions: reliable::TransactionTable::new(),
           separate: Vec::new() }
  }

  /// Create a new server with a specific runtime config.
  pub fn new_config(config: Config,
                    ServerConfig { clock, sock }: ServerConfig<P::Clock, P::Socket>)
                    -> Self {
    Self { core: Core::new_config(config, clock, sock),
           resources: Tree::new(),
           observers: observe::Registry::new(),
           connections: reliable::ConnectionTable::new(),
           transactions: reliable::TransactionTable::new(),
           separate: Vec::new() }
  }

  /// The server's reliable-transport connection table (RFC 8323).
  ///
  /// Unlike the unreliable UDP path, reliable-transport signaling
  /// messages (CSM, Ping, Pong, Release, Abort) sit outside the
  /// request/response pipeline `Steps` drives; platforms that bridge a
  /// stream transport are expected to detect class-7 coded datagrams
  /// themselves and route them through [`Server::handle_signal`].
  pub fn connections(&self) -> &reliable::ConnectionTable {
    &self.connections
  }

  /// The server's reliable-transport connection table, for mutation.
  pub fn connections_mut(&mut self) -> &mut reliable::ConnectionTable {
    &mut self.connections
  }

  /// Process a single reliable-transport signaling message (RFC 8323
  /// §5) received from `addr`, returning a reply to send back if one is
  /// required.
  pub fn handle_signal(&mut self,
                        addr: SocketAddr,
                        msg: &platform::Message<P>)
                        -> Option<platform::Message<P>> {
    let conn = self.connections.open(addr);

    match reliable::handle_signal::<P>(conn, msg) {
      | reliable::SignalAction::Reply(reply) => Some(reply),
      | reliable::SignalAction::Abort => {
        self.connections.close(addr);
        self.transactions.cancel_peer(addr);
        None
      },
      | reliable::SignalAction::None => None,
    }
  }

  /// Mount a resource (and its subtree) under the server's root.
  ///
  /// See [`Tree::attach`].
  pub fn attach(&mut self,
                parent_path: &[&str],
                child: crate::server::resource::Resource<P>)
                -> Result<(), crate::server::resource::Error> {
    self.resources.attach(parent_path, child)
  }

  /// Remove a resource (and its subtree).
  ///
  /// See [`Tree::detach`].
  pub fn detach(&mut self, path: &[&str]) -> Option<crate::server::resource::Resource<P>> {
    self.resources.detach(path)
  }

  /// The server's resource tree, for direct inspection.
  pub fn resources(&self) -> &Tree<P> {
    &self.resources
  }

  /// The server's resource tree, for direct mutation.
  pub fn resources_mut(&mut self) -> &mut Tree<P> {
    &mut self.resources
  }

  /// The server's observer registry.
  pub fn observers(&self) -> &observe::Registry {
    &self.observers
  }

  fn now_millis(&self) -> u64 {
    self.core
        .clock()
        .try_now()
        .ok()
        .and_then(|i| Milliseconds::<u64>::try_from(i.duration_since_epoch()).ok())
        .map(|m| m.0)
        .unwrap_or(0)
  }

  fn handle_one(&mut self, Addrd(req, addr): Addrd<Req<P>>) -> nb::Result<(), <Core<P, Steps> as Platform<Steps>>::Error> {
    self.observers.process(addr, &req);

    if let Some((resp, handle)) = self.resources.dispatch(&req, addr) {
      if let Some(handle) = handle {
        self.separate.push(handle);
      }

      self.core.send_msg(Addrd(resp.into(), addr)).map(|_| ())
    } else {
      Ok(())
    }
  }

  /// Separate-response handles captured from handlers that called
  /// [`Resp::serialize_empty_ack`](crate::resp::Resp::serialize_empty_ack)
  /// instead of answering synchronously, awaiting a call to
  /// [`Server::submit_separate`].
  pub fn pending_separate(&self) -> &[SeparateResponseHandle] {
    &self.separate
  }

  /// Submit the deferred real response for a request a handler
  /// previously ACKed empty (see [`Tree::dispatch`]'s
  /// [`SeparateResponseHandle`]).
  ///
  /// Sends `resp` (which should carry `handle`'s token, e.g. built via
  /// [`SeparateResponseHandle::response`]) to the peer that made the
  /// original request, and drops `handle` from the pending queue.
  pub fn submit_separate(&mut self,
                          handle: SeparateResponseHandle,
                          resp: Resp<P>)
                          -> nb::Result<(Id, Token), <Core<P, Steps> as Platform<Steps>>::Error> {
    self.separate.retain(|h| *h != handle);
    self.core.send_msg(handle.addrd(resp))
  }

  /// Notify every registered observer that a fresh representation of
  /// `path` is available, invoking `build` once per subscriber to fill
  /// in the notification's code and payload.
  pub fn notify<F>(&mut self,
                    mut build: F)
                    -> nb::Result<(), <Core<P, Steps> as Platform<Steps>>::Error>
    where F: FnMut(&mut crate::resp::Resp<P>)
  {
    let notifications = self.observers.notify(self.core.clock(), &mut build);

    for Addrd(resp, addr) in notifications {
      self.core.send_msg(Addrd(resp.into(), addr))?;
    }

    Ok(())
  }

  /// Run one iteration of the server loop: drain every request
  /// currently waiting on the socket (dispatching each through the
  /// resource tree), then advance time-driven bookkeeping (reliable
  /// transaction expiration) by one tick.
  ///
  /// Returns `Ok(true)` if the server should keep running, `Ok(false)`
  /// if it should stop (reserved for future graceful-shutdown support;
  /// currently always returns `true` on success).
  ///
  /// `timeout_millis` bounds how long this call may spend waiting for
  /// the first message to arrive. Subsequent messages already queued
  /// on the socket are drained without waiting again.
  pub fn run(&mut self,
             timeout_millis: u64)
             -> Result<bool, <Core<P, Steps> as Platform<Steps>>::Error> {
    let deadline = self.now_millis().saturating_add(timeout_millis);

    loop {
      match self.core.poll_req() {
        | Ok(addrd_req) => {
          nb::block!(self.handle_one(addrd_req))?;
        },
        | Err(nb::Error::WouldBlock) => {
          let now = self.now_millis();
          if now >= deadline {
            break;
          }

          self.core
              .socket()
              .wait(deadline - now)
              .map_err(crate::platform::PlatformError::socket)?;

          if self.now_millis() >= deadline {
            break;
          }

          continue;
        },
        | Err(nb::Error::Other(e)) => return Err(e),
      }

      if self.now_millis() >= deadline {
        break;
      }
    }

    self.tick();

    Ok(true)
  }

  fn tick(&mut self) {
    // The unreliable CON/NON path's retry bookkeeping already happens
    // inside `Steps` on every `poll_req`/`poll_resp`, driven by the
    // snapshot's clock reading; only the reliable-transport table needs
    // an explicit sweep here.
    self.transactions.tick(self.now_millis());
    self.transactions.reap();
  }
}
