//! Control plane: command protocol, socket transport and client

mod client;
mod handler;
mod server;

pub use client::{execute, run_repl, ControlClient};
pub use handler::{Applied, Command, ControlSession, MAX_COMMAND_LEN};
pub use server::{handle_session, ControlServer, DEFAULT_IDLE_TIMEOUT, DEFAULT_SOCKET_PATH};
