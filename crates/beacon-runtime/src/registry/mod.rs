mod consul;
mod handle;

pub use consul::ConsulClient;
pub use handle::RegistrationHandle;
