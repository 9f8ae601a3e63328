use crate::messages::{HostCommand, HostResponse};
use crate::transport::TransportDuplex;
use anyhow::Result;

pub struct HostServer {
    transport: Box<dyn TransportDuplex>,
}

impl HostServer {
    pub fn new(transport: Box<dyn TransportDuplex>) -> Self {
        Self { transport }
    }

    pub async fn next_command(&mut self) -> Result<HostCommand> {
        let msg = self.transport.recv_bytes().await?;
        let command: HostCommand = bincode::deserialize(&msg)?;
        Ok(command)
    }

    pub async fn send_response(&mut self, response: HostResponse) -> Result<()> {
        let msg = bincode::serialize(&response)?;
        self.transport.send_bytes(&msg).await?;
        Ok(())
    }
}
