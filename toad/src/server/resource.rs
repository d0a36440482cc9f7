use no_std_net::SocketAddr;
use std_alloc::boxed::Box;
use std_alloc::string::String;
use std_alloc::vec::Vec;

use toad_msg::{Id, Message, MessageOptions, Payload, Token, Type};

use crate::net::Addrd;
use crate::platform::{self, PlatformTypes};
use crate::req::{Method, Req};
use crate::resp::{code, Resp};

/// A function invoked when an incoming request matches a [`Resource`]'s
/// path and method.
///
/// Receives the request and a response already pre-populated by
/// [`Resp::for_request`] (type/id/token already mirror the request); the
/// handler fills in the code, options and payload.
pub type Handler<P> = Box<dyn Fn(&Req<P>, &mut Resp<P>) + Send + Sync>;

/// Captured peer + token for a request a handler could not answer
/// synchronously, returned by [`Tree::dispatch`] alongside the empty ACK
/// whenever a handler calls [`Resp::serialize_empty_ack`].
///
/// The handler is responsible for holding on to this (e.g. in a queue
/// processed on a later `run` iteration) and using it to build and
/// submit the real response once it's ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparateResponseHandle {
  addr: SocketAddr,
  token: Token,
}

impl SeparateResponseHandle {
  /// The peer that sent the original request.
  pub fn addr(&self) -> SocketAddr {
    self.addr
  }

  /// The token the real response must carry to be associated with the
  /// request that was ACKed empty.
  pub fn token(&self) -> Token {
    self.token
  }

  /// Build a fresh Confirmable response carrying this handle's token,
  /// for the application to fill in code/payload before submitting.
  pub fn response<P: PlatformTypes>(&self) -> Resp<P> {
    let msg = Message { ty: Type::Con,
                        id: Id(Default::default()),
                        opts: P::MessageOptions::default(),
                        code: code::CONTENT,
                        ver: Default::default(),
                        payload: Payload(Default::default()),
                        token: self.token };

    Resp::from(msg)
  }

  /// Pair `resp` with the captured peer address, ready to hand to the
  /// engine's send path as the deferred real response.
  pub fn addrd<P: PlatformTypes>(&self, resp: Resp<P>) -> Addrd<platform::Message<P>> {
    Addrd(resp.into(), self.addr)
  }
}

/// Error conditions raised while mutating a [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
  /// `attach` was asked to place a node under a path segment that does
  /// not resolve to any existing node.
  ResourceNotFound,
  /// `attach` found a child already present with the same path segment
  /// under the intended parent.
  ChildAlreadyPresent,
}

/// One node of a [`Tree`].
///
/// Stores a single Uri-Path segment and up to four method handlers
/// (GET/POST/PUT/DELETE), mirroring RFC 7252's request methods exactly —
/// there is deliberately no fifth slot for PATCH/FETCH.
pub struct Resource<P: PlatformTypes> {
  segment: String,
  get: Option<Handler<P>>,
  post: Option<Handler<P>>,
  put: Option<Handler<P>>,
  delete: Option<Handler<P>>,
  children: Vec<Resource<P>>,
}

impl<P: PlatformTypes> core::fmt::Debug for Resource<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Resource")
     .field("segment", &self.segment)
     .field("get", &self.get.is_some())
     .field("post", &self.post.is_some())
     .field("put", &self.put.is_some())
     .field("delete", &self.delete.is_some())
     .field("children", &self.children)
     .finish()
  }
}

impl<P: PlatformTypes> Resource<P> {
  /// Create a new resource node for a single path segment, with no
  /// handlers and no children.
  pub fn new(segment: impl Into<String>) -> Self {
    Self { segment: segment.into(),
           get: None,
           post: None,
           put: None,
           delete: None,
           children: Vec::new() }
  }

  /// Attach a GET handler
  pub fn get(mut self, f: impl Fn(&Req<P>, &mut Resp<P>) + Send + Sync + 'static) -> Self {
    self.get = Some(Box::new(f));
    self
  }

  /// Attach a POST handler
  pub fn post(mut self, f: impl Fn(&Req<P>, &mut Resp<P>) + Send + Sync + 'static) -> Self {
    self.post = Some(Box::new(f));
    self
  }

  /// Attach a PUT handler
  pub fn put(mut self, f: impl Fn(&Req<P>, &mut Resp<P>) + Send + Sync + 'static) -> Self {
    self.put = Some(Box::new(f));
    self
  }

  /// Attach a DELETE handler
  pub fn delete(mut self, f: impl Fn(&Req<P>, &mut Resp<P>) + Send + Sync + 'static) -> Self {
    self.delete = Some(Box::new(f));
    self
  }

  /// This node's path segment
  pub fn segment(&self) -> &str {
    &self.segment
  }

  /// Children attached directly underneath this node
  pub fn children(&self) -> &[Resource<P>] {
    &self.children
  }

  /// Whether this node has at least one method handler
  pub fn has_handler(&self) -> bool {
    self.get.is_some() || self.post.is_some() || self.put.is_some() || self.delete.is_some()
  }

  fn handler(&self, method: Method) -> Option<&Handler<P>> {
    match method {
      | Method::GET => self.get.as_ref(),
      | Method::POST => self.post.as_ref(),
      | Method::PUT => self.put.as_ref(),
      | Method::DELETE => self.delete.as_ref(),
      | _ => None,
    }
  }

  fn find_child(&self, segment: &str) -> Option<&Resource<P>> {
    self.children.iter().find(|c| c.segment == segment)
  }

  fn find_child_mut(&mut self, segment: &str) -> Option<&mut Resource<P>> {
    self.children.iter_mut().find(|c| c.segment == segment)
  }

  /// Attach `child` directly underneath this node.
  ///
  /// Fails with [`Error::ChildAlreadyPresent`] if a child with the same
  /// path segment is already attached; the spec explicitly resolves
  /// this as a reported failure rather than an overwrite.
  pub fn attach(&mut self, child: Resource<P>) -> Result<(), Error> {
    if self.find_child(&child.segment).is_some() {
      return Err(Error::ChildAlreadyPresent);
    }

    self.children.push(child);
    Ok(())
  }

  /// Detach the direct child with path segment `segment`, along with
  /// its entire subtree.
  pub fn detach(&mut self, segment: &str) -> Option<Resource<P>> {
    let ix = self.children.iter().position(|c| c.segment == segment)?;
    Some(self.children.remove(ix))
  }
}

/// A resource tree: the root matches the empty path, and every other
/// node is reached by walking one Uri-Path segment at a time.
///
/// Because each node owns its children directly (there are no parent
/// pointers, no shared ownership), a node can never be attached as its
/// own ancestor — the cycle the original C++ implementation has to
/// guard against by walking the parent chain is structurally impossible
/// here.
pub struct Tree<P: PlatformTypes> {
  root: Resource<P>,
}

impl<P: PlatformTypes> core::fmt::Debug for Tree<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Tree").field("root", &self.root).finish()
  }
}

impl<P: PlatformTypes> Default for Tree<P> {
  fn default() -> Self {
    Self::new()
  }
}

impl<P: PlatformTypes> Tree<P> {
  /// Create an empty tree with just a root node.
  pub fn new() -> Self {
    Self { root: Resource::new("") }
  }

  /// The root node
  pub fn root(&self) -> &Resource<P> {
    &self.root
  }

  /// The root node, mutably
  pub fn root_mut(&mut self) -> &mut Resource<P> {
    &mut self.root
  }

  /// Find the node reached by walking `path` (Uri-Path segments) from
  /// the root. Returns `None` as soon as any segment fails to match.
  pub fn lookup(&self, path: &[&str]) -> Option<&Resource<P>> {
    let mut node = &self.root;
    for seg in path {
      node = node.find_child(seg)?;
    }
    Some(node)
  }

  /// As [`Tree::lookup`], mutably.
  pub fn lookup_mut(&mut self, path: &[&str]) -> Option<&mut Resource<P>> {
    let mut node = &mut self.root;
    for seg in path {
      node = node.find_child_mut(seg)?;
    }
    Some(node)
  }

  /// Attach `child` under the node found by walking `parent_path` from
  /// the root (an empty slice attaches directly under the root).
  pub fn attach(&mut self, parent_path: &[&str], child: Resource<P>) -> Result<(), Error> {
    let parent = if parent_path.is_empty() {
      &mut self.root
    } else {
      self.lookup_mut(parent_path).ok_or(Error::ResourceNotFound)?
    };

    parent.attach(child)
  }

  /// Detach the node (and its subtree) found at `path`.
  ///
  /// Returns `None` if `path` is empty (the root cannot be detached) or
  /// doesn't resolve to an existing node.
  pub fn detach(&mut self, path: &[&str]) -> Option<Resource<P>> {
    let (last, parent_path) = path.split_last()?;
    let parent = if parent_path.is_empty() {
      &mut self.root
    } else {
      self.lookup_mut(parent_path)?
    };

    parent.detach(last)
  }

  /// Dispatch an incoming request (received from `addr`) against this
  /// tree.
  ///
  /// Returns `None` only when the request itself carries no response
  /// (EMPTY/RESET messages, per [`Resp::for_request`]); everything else
  /// gets a 4.04, a 4.05, or whatever the matched handler produced.
  ///
  /// If the matched handler called [`Resp::serialize_empty_ack`] to
  /// defer its real response, the returned tuple also carries a
  /// [`SeparateResponseHandle`] capturing `addr` and the request's
  /// token, for the application to submit the real response with later.
  pub fn dispatch(&self,
                   req: &Req<P>,
                   addr: SocketAddr)
                   -> Option<(Resp<P>, Option<SeparateResponseHandle>)> {
    let mut resp = Resp::for_request(req)?;

    let segments: Vec<&str> = match req.msg().path() {
      | Ok(segments) => segments,
      | Err(_) => {
        resp.set_code(code::BAD_REQUEST);
        return Some((resp, None));
      },
    };

    if segments == [".well-known", "core"] {
      well_known_core(self, &mut resp);
      return Some((resp, None));
    }

    match self.lookup(&segments) {
      | None => resp.set_code(code::NOT_FOUND),
      | Some(node) => match node.handler(req.method()) {
        | None => resp.set_code(code::METHOD_NOT_ALLOWED),
        | Some(handler) => handler(req, &mut resp),
      },
    }

    let handle = resp.is_empty_ack().then(|| SeparateResponseHandle { addr,
                                                                      token: resp.token() });

    Some((resp, handle))
  }
}

/// Built-in handler for `.well-known/core`: walks the tree depth-first
/// and emits an RFC 6690 link-format listing of every node that has at
/// least one method handler. Applications may ignore this and attach
/// their own node at that path instead.
fn well_known_core<P: PlatformTypes>(tree: &Tree<P>, resp: &mut Resp<P>) {
  let mut out = String::new();
  let mut path = String::new();
  collect_links(&tree.root, &mut path, &mut out);

  if out.ends_with(',') {
    out.pop();
  }

  resp.set_code(code::CONTENT);
  resp.msg_mut()
      .set_content_format(toad_msg::ContentFormat::LinkFormat)
      .ok();
  resp.set_payload(out.into_bytes());
}

fn collect_links<P: PlatformTypes>(node: &Resource<P>, path: &mut String, out: &mut String) {
  let has_segment = !node.segment.is_empty();
  let mark = path.len();

  if has_segment {
    path.push('/');
    path.push_str(&node.segment);
  }

  if has_segment && node.has_handler() {
    out.push('<');
    out.push_str(path);
    out.push_str(">,");
  }

  for child in &node.children {
    collect_links(child, path, out);
  }

  path.truncate(mark);
}

#[cfg(test)]
mod tests {
  use core::str::FromStr;

  use toad_msg::Type;

  use super::*;
  use crate::std::PlatformTypes as Std;

  fn get(path: &str) -> Req<Std> {
    Req::get(path)
  }

  fn addr() -> SocketAddr {
    SocketAddr::from_str("127.0.0.1:5683").unwrap()
  }

  #[test]
  fn attach_and_lookup() {
    let mut tree = Tree::<Std>::new();
    tree.attach(&[], Resource::new("sensors")).unwrap();
    tree.attach(&["sensors"], Resource::new("temp")).unwrap();

    assert!(tree.lookup(&["sensors"]).is_some());
    assert!(tree.lookup(&["sensors", "temp"]).is_some());
    assert!(tree.lookup(&["sensors", "humidity"]).is_none());
  }

  #[test]
  fn attach_duplicate_fails() {
    let mut tree = Tree::<Std>::new();
    tree.attach(&[], Resource::new("sensors")).unwrap();
    assert_eq!(tree.attach(&[], Resource::new("sensors")), Err(Error::ChildAlreadyPresent));
  }

  #[test]
  fn detach_removes_subtree() {
    let mut tree = Tree::<Std>::new();
    tree.attach(&[], Resource::new("sensors")).unwrap();
    tree.attach(&["sensors"], Resource::new("temp")).unwrap();

    let removed = tree.detach(&["sensors"]).unwrap();
    assert_eq!(removed.segment(), "sensors");
    assert!(tree.lookup(&["sensors"]).is_none());
  }

  #[test]
  fn dispatch_not_found() {
    let tree = Tree::<Std>::new();
    let mut req = get("nope");
    req.msg_mut().ty = Type::Con;
    req.msg_mut().id = toad_msg::Id(1);

    let (resp, handle) = tree.dispatch(&req, addr()).unwrap();
    assert_eq!(resp.msg().code, code::NOT_FOUND);
    assert!(handle.is_none());
  }

  #[test]
  fn dispatch_method_not_allowed() {
    let mut tree = Tree::<Std>::new();
    tree.attach(&[], Resource::new("sensors").post(|_, r| r.set_code(code::CHANGED)))
        .unwrap();

    let mut req = get("sensors");
    req.msg_mut().ty = Type::Con;
    req.msg_mut().id = toad_msg::Id(1);

    let (resp, handle) = tree.dispatch(&req, addr()).unwrap();
    assert_eq!(resp.msg().code, code::METHOD_NOT_ALLOWED);
    assert!(handle.is_none());
  }

  #[test]
  fn dispatch_invokes_handler() {
    let mut tree = Tree::<Std>::new();
    tree.attach(&[], Resource::new("sensors").get(|_, r| {
          r.set_code(code::CONTENT);
          r.set_payload("21C".bytes());
        }))
        .unwrap();

    let mut req = get("sensors");
    req.msg_mut().ty = Type::Con;
    req.msg_mut().id = toad_msg::Id(1);

    let (resp, handle) = tree.dispatch(&req, addr()).unwrap();
    assert_eq!(resp.msg().code, code::CONTENT);
    assert_eq!(resp.payload_string().unwrap(), "21C");
    assert!(handle.is_none());
  }

  #[test]
  fn dispatch_defers_separate_response() {
    let mut tree = Tree::<Std>::new();
    tree.attach(&[], Resource::new("sensors").get(|_, r| r.serialize_empty_ack()))
        .unwrap();

    let mut req = get("sensors");
    req.msg_mut().ty = Type::Con;
    req.msg_mut().id = toad_msg::Id(1);
    let token = req.msg().token;

    let (resp, handle) = tree.dispatch(&req, addr()).unwrap();
    assert!(resp.is_empty_ack());

    let handle = handle.expect("handler deferred its response");
    assert_eq!(handle.addr(), addr());
    assert_eq!(handle.token(), token);

    let mut real: Resp<Std> = handle.response();
    real.set_code(code::CONTENT);
    real.set_payload("21C".bytes());

    let Addrd(msg, sent_to) = handle.addrd(real);
    assert_eq!(sent_to, addr());
    assert_eq!(msg.token, token);
    assert_eq!(msg.code, code::CONTENT);
  }

  #[test]
  fn well_known_core_lists_handlers() {
    let mut tree = Tree::<Std>::new();
    tree.attach(&[], Resource::new("sensors").get(|_, r| r.set_code(code::CONTENT)))
        .unwrap();
    tree.attach(&["sensors"], Resource::new("temp").get(|_, r| r.set_code(code::CONTENT)))
        .unwrap();

    let mut req = get(".well-known/core");
    req.msg_mut().ty = Type::Con;
    req.msg_mut().id = toad_msg::Id(1);

    let (resp, _) = tree.dispatch(&req, addr()).unwrap();
    let body = resp.payload_string().unwrap();
    assert!(body.contains("</sensors>"));
    assert!(body.contains("</sensors/temp>"));
  }
}
