//! The adapter's only dependency on an actual socket or stdio pipe (spec
//! §6): framing and delivery are out of scope, this crate only needs
//! somewhere to push notifications.

pub trait RpcTransport: Send + Sync {
    fn send_notification(&self, method: &str, params: serde_json::Value);
}
