//! # Command Client
//!
//! Sends vehicle commands to the vehicle and receives its response to each of them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::dock::{CommandResponse, VehicleCommand},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Request/response transport for vehicle commands.
pub trait CommandTransport {
    /// Send the command and wait for the vehicle's response.
    fn send_command(&mut self, cmd: &VehicleCommand) -> Result<CommandResponse, CommandClientError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command transport over a ZMQ `REQ` socket.
pub struct ZmqCommandClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum CommandClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the vehicle")]
    NotConnected,

    #[error("Could not send the command to the vehicle: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a response from the vehicle: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the command: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the vehicle: {0}")]
    DeserializeError(serde_json::Error),

    #[error("Response was for command {0} rather than command {1}")]
    SequenceMismatch(u64, u64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ZmqCommandClient {
    /// Connect a new command client to the vehicle's command endpoint.
    ///
    /// `timeout_ms` bounds both sending a command and waiting for its response.
    pub fn new(ctx: &zmq::Context, endpoint: &str, timeout_ms: i32) -> Result<Self, CommandClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: timeout_ms,
            send_timeout: timeout_ms,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, endpoint)
            .map_err(CommandClientError::SocketError)?;

        Ok(Self { socket })
    }
}

impl CommandTransport for ZmqCommandClient {
    fn send_command(&mut self, cmd: &VehicleCommand) -> Result<CommandResponse, CommandClientError> {
        if !self.socket.connected() {
            return Err(CommandClientError::NotConnected);
        }

        let cmd_str = serde_json::to_string(cmd).map_err(CommandClientError::SerializationError)?;

        self.socket
            .send(&cmd_str, 0)
            .map_err(CommandClientError::SendError)?;

        let msg = self
            .socket
            .recv_msg(0)
            .map_err(CommandClientError::RecvError)?;

        let response: CommandResponse = serde_json::from_str(msg.as_str().unwrap_or(""))
            .map_err(CommandClientError::DeserializeError)?;

        if response.sequence_number != cmd.sequence_number() {
            return Err(CommandClientError::SequenceMismatch(
                response.sequence_number,
                cmd.sequence_number(),
            ));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::dock::{ArcDriveSegment, CommandErrorCode};
    use std::thread;

    #[test]
    fn test_command_round_trip() {
        let ctx = zmq::Context::new();

        // Minimal vehicle acknowledging every command
        let rep = ctx.socket(zmq::REP).unwrap();
        rep.bind("tcp://127.0.0.1:45871").unwrap();
        let vehicle = thread::spawn(move || {
            let msg = rep.recv_msg(0).unwrap();
            let cmd: VehicleCommand = serde_json::from_str(msg.as_str().unwrap()).unwrap();
            let response = CommandResponse {
                sequence_number: cmd.sequence_number(),
                error_code: CommandErrorCode::Ok,
            };
            rep.send(&serde_json::to_string(&response).unwrap(), 0)
                .unwrap();
        });

        let mut client = ZmqCommandClient::new(&ctx, "tcp://127.0.0.1:45871", 1000).unwrap();
        let cmd = VehicleCommand::ArcDrive {
            sequence_number: 12,
            segments: vec![ArcDriveSegment {
                curvature_inverse_m: 0.0,
                linear_velocity_mps: 0.0,
                target_start_time_nanos: 1,
            }],
        };

        // Wait for the monitor to report the connection
        let mut response = client.send_command(&cmd);
        for _ in 0..100 {
            if !matches!(response, Err(CommandClientError::NotConnected)) {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
            response = client.send_command(&cmd);
        }

        let response = response.unwrap();
        assert_eq!(response.sequence_number, 12);
        assert_eq!(response.error_code, CommandErrorCode::Ok);

        vehicle.join().unwrap();
    }
}
