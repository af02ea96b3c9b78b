mod server;
mod tracing;

pub use server::{router, Downstream, GatewayState};
pub use tracing::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
