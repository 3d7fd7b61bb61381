//! JSON-RPC adapter (spec §6): exposes [`cca_engine::CcaEngine`] over a
//! transport-agnostic request/response and notification surface.

pub mod buffer;
pub mod dispatch;
pub mod protocol;
pub mod transport;

pub use buffer::{BufferedTransport, DEFAULT_NOTIFICATION_CAP};
pub use dispatch::RpcAdapter;
pub use protocol::{
    app_error_to_rpc, RpcError, RpcRequest, RpcResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    PARSE_ERROR,
};
pub use transport::RpcTransport;
