pub mod ports;
pub mod process;
pub mod traits;

pub use ports::PortAllocator;
pub use process::ProcessBackend;
pub use traits::{ContextHandle, IsolationBackend, TeardownRefused};
