use crate::model::InstanceInfo;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub enum HostCommand {
    /// Start a new instance of a discovered service class.
    StartService { service_class: String },
    /// Stop one running instance by its (possibly disambiguated) name.
    StopInstance { instance: String },
    /// List available service classes and running instances.
    QueryService,
    /// Forward an opaque payload to a running instance. Payload
    /// semantics are owned by the target service.
    ExecInstance { target: String, payload: Vec<u8> },
    /// Stop every instance and shut the host down.
    Shutdown,
}

#[derive(Serialize, Deserialize, Debug)]
pub enum HostResponse {
    /// Acknowledgment for StartService. On success `message` carries
    /// the service class name; on failure it is empty.
    StartAck { started: bool, message: String },
    /// Acknowledgment for StopInstance.
    StopAck { stopped: bool },
    /// Answer to QueryService.
    Services {
        available: Vec<String>,
        running: Vec<InstanceInfo>,
    },
    /// Raw reply from the target of an ExecInstance.
    ExecReply { payload: Vec<u8> },
    Success(String),
    Error(String),
}
