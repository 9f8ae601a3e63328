use anyhow::Result;
use clap::{Parser, Subcommand};
use host_protocol::{HostClient, HostCommand, HostResponse, TcpClientDuplex};

#[derive(Parser)]
#[command(name = "hostctl")]
#[command(about = "CLI controller for a running execution host")]
struct Cli {
    /// Address of the host's command interface
    #[arg(long, default_value = "127.0.0.1:5800")]
    addr: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new instance of a service class
    Start {
        /// Service class name as listed by `query`
        service: String,
    },
    /// Stop one running instance
    Stop {
        /// Instance name, possibly disambiguated (e.g. "Foo[1]")
        instance: String,
    },
    /// List available service classes and running instances
    Query,
    /// Forward a payload to a running instance
    Exec {
        /// Target instance name
        target: String,
        /// Payload handed to the instance as-is
        payload: String,
    },
    /// Stop all instances and shut the host down
    Shutdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let transport = Box::new(TcpClientDuplex::connect(&cli.addr).await?);
    let mut client = HostClient::new(transport);

    let command = match cli.command {
        Commands::Start { service } => HostCommand::StartService {
            service_class: service,
        },
        Commands::Stop { instance } => HostCommand::StopInstance { instance },
        Commands::Query => HostCommand::QueryService,
        Commands::Exec { target, payload } => HostCommand::ExecInstance {
            target,
            payload: payload.into_bytes(),
        },
        Commands::Shutdown => HostCommand::Shutdown,
    };

    let response = client.send_command(command).await?;
    print_response(response);
    Ok(())
}

fn print_response(response: HostResponse) {
    match response {
        HostResponse::StartAck { started, message } => {
            if started {
                println!("started: {}", message);
            } else {
                println!("start failed");
            }
        }
        HostResponse::StopAck { stopped } => {
            println!("{}", if stopped { "stopped" } else { "stop failed" });
        }
        HostResponse::Services { available, running } => {
            println!("available:");
            for service in available {
                println!("  {}", service);
            }
            println!("running:");
            for instance in running {
                println!(
                    "  {} ({}, pid {}, since {})",
                    instance.name, instance.service_class, instance.pid, instance.started_at
                );
            }
        }
        HostResponse::ExecReply { payload } => {
            println!("{}", String::from_utf8_lossy(&payload));
        }
        HostResponse::Success(msg) => println!("{}", msg),
        HostResponse::Error(msg) => eprintln!("error: {}", msg),
    }
}
