/// A non-blocking, unordered, unreliable transport supplied by the
/// embedder (typically a UDP socket, or an in-process loopback for tests).
///
/// `send_to` is best-effort; drops are tolerated, the retransmit window
/// recovers. `receive_all` must return every packet received since the
/// previous call and must not block. There is no `free_data` analogue:
/// returned buffers are owned `Vec<u8>`s, freed by ordinary drop.
pub trait NonBlockingSocket<A> {
    fn send_to(&mut self, addr: &A, data: &[u8]);
    fn receive_all(&mut self) -> Vec<(A, Vec<u8>)>;
}
