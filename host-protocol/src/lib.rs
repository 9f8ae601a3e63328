pub mod client;
pub mod messages;
pub mod model;
pub mod server;
pub mod transport;

pub use client::HostClient;
pub use messages::{HostCommand, HostResponse};
pub use model::{Descriptor, InstanceInfo, ServiceManifest};
pub use server::HostServer;
pub use transport::{MemoryDuplex, TcpClientDuplex, TcpServerDuplex, TransportDuplex};
