//! Buffers notifications until a real handler is attached (spec §6): a
//! session can emit `awaiting-arbiter`/`decision` events before any RPC
//! client has connected, so nothing is lost in between. Unbounded by
//! default; [`DEFAULT_NOTIFICATION_CAP`] is the recommended cap for long-
//! running deployments, mirroring [`cca_feed::SharedFeed`]'s FIFO-trim
//! idiom.

use crate::transport::RpcTransport;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::warn;

pub const DEFAULT_NOTIFICATION_CAP: usize = 10_000;

type Handler = Box<dyn Fn(&str, serde_json::Value) + Send + Sync>;

pub struct BufferedTransport {
    cap: Option<usize>,
    handler: Mutex<Option<Handler>>,
    buffer: Mutex<VecDeque<(String, serde_json::Value)>>,
}

impl BufferedTransport {
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            cap,
            handler: Mutex::new(None),
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Attaches a handler, immediately draining anything buffered so far
    /// through it in arrival order.
    pub fn attach(&self, handler: Handler) {
        let mut buffered = self.buffer.lock();
        while let Some((method, params)) = buffered.pop_front() {
            handler(&method, params);
        }
        *self.handler.lock() = Some(handler);
    }

    pub fn detach(&self) {
        *self.handler.lock() = None;
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().len()
    }
}

impl RpcTransport for BufferedTransport {
    fn send_notification(&self, method: &str, params: serde_json::Value) {
        if let Some(handler) = self.handler.lock().as_ref() {
            handler(method, params);
            return;
        }
        let mut buffered = self.buffer.lock();
        buffered.push_back((method.to_string(), params));
        if let Some(cap) = self.cap {
            while buffered.len() > cap {
                buffered.pop_front();
                warn!(cap, "notification buffer overflow, dropping oldest");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn notifications_before_attach_are_buffered_not_lost() {
        let transport = BufferedTransport::unbounded();
        transport.send_notification("workflow/awaitingArbiter", serde_json::json!({"n": 1}));
        transport.send_notification("workflow/awaitingArbiter", serde_json::json!({"n": 2}));
        assert_eq!(transport.buffered_len(), 2);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        transport.attach(Box::new(move |_method, params| sink.lock().push(params)));

        assert_eq!(transport.buffered_len(), 0);
        assert_eq!(received.lock().len(), 2);
    }

    #[test]
    fn attached_handler_receives_directly_without_buffering() {
        let transport = BufferedTransport::unbounded();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = count.clone();
        transport.attach(Box::new(move |_method, _params| {
            sink.fetch_add(1, Ordering::SeqCst);
        }));
        transport.send_notification("workflow/decision", serde_json::json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(transport.buffered_len(), 0);
    }

    #[test]
    fn a_capped_buffer_drops_the_oldest_entry_on_overflow() {
        let transport = BufferedTransport::new(Some(2));
        transport.send_notification("m", serde_json::json!(1));
        transport.send_notification("m", serde_json::json!(2));
        transport.send_notification("m", serde_json::json!(3));
        assert_eq!(transport.buffered_len(), 2);
    }
}
