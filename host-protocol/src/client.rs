use crate::messages::{HostCommand, HostResponse};
use crate::transport::TransportDuplex;
use anyhow::Result;

pub struct HostClient {
    transport: Box<dyn TransportDuplex>,
}

impl HostClient {
    pub fn new(transport: Box<dyn TransportDuplex>) -> Self {
        Self { transport }
    }

    pub async fn send_command(&mut self, command: HostCommand) -> Result<HostResponse> {
        let msg = bincode::serialize(&command)?;
        self.transport.send_bytes(&msg).await?;

        let response_bytes = self.transport.recv_bytes().await?;
        let response: HostResponse = bincode::deserialize(&response_bytes)?;

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::HostServer;
    use crate::transport::MemoryDuplex;

    #[tokio::test]
    async fn client_server_exchange_over_memory_transport() {
        let (client_side, server_side) = MemoryDuplex::pair();
        let mut client = HostClient::new(Box::new(client_side));
        let mut server = HostServer::new(Box::new(server_side));

        let server_task = tokio::spawn(async move {
            let cmd = server.next_command().await.unwrap();
            match cmd {
                HostCommand::StartService { service_class } => {
                    assert_eq!(service_class, "LoginService");
                    server
                        .send_response(HostResponse::StartAck {
                            started: true,
                            message: service_class,
                        })
                        .await
                        .unwrap();
                }
                other => panic!("Unexpected command: {:?}", other),
            }
        });

        let response = client
            .send_command(HostCommand::StartService {
                service_class: "LoginService".into(),
            })
            .await
            .unwrap();

        match response {
            HostResponse::StartAck { started, message } => {
                assert!(started);
                assert_eq!(message, "LoginService");
            }
            other => panic!("Unexpected response: {:?}", other),
        }
        server_task.await.unwrap();
    }
}
