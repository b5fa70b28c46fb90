use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use synframe::NonBlockingSocket;

/// An in-process, address-by-small-integer transport for tests: every
/// socket shares one `Router`, addressing each other by peer id instead of
/// a real network address. Delivery is immediate and lossless, which is
/// enough to exercise the handshake, input exchange and rollback paths
/// without a real socket.
#[derive(Default)]
pub struct Router {
    inboxes: HashMap<usize, VecDeque<(usize, Vec<u8>)>>,
}

pub struct LoopbackSocket {
    id: usize,
    router: Rc<RefCell<Router>>,
}

impl LoopbackSocket {
    pub fn new(id: usize, router: &Rc<RefCell<Router>>) -> Self {
        router.borrow_mut().inboxes.entry(id).or_default();
        Self { id, router: router.clone() }
    }
}

impl NonBlockingSocket<usize> for LoopbackSocket {
    fn send_to(&mut self, addr: &usize, data: &[u8]) {
        let mut router = self.router.borrow_mut();
        router.inboxes.entry(*addr).or_default().push_back((self.id, data.to_vec()));
    }

    fn receive_all(&mut self) -> Vec<(usize, Vec<u8>)> {
        let mut router = self.router.borrow_mut();
        router.inboxes.entry(self.id).or_default().drain(..).collect()
    }
}

pub fn router_pair() -> (Rc<RefCell<Router>>, LoopbackSocket, LoopbackSocket) {
    let router = Rc::new(RefCell::new(Router::default()));
    let a = LoopbackSocket::new(0, &router);
    let b = LoopbackSocket::new(1, &router);
    (router, a, b)
}
