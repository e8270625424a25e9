//! Command handler translating control lines into flight controller calls

use crate::command::{CommandHandler, ServerHandle};
use crate::control::command::ControlCommand;
use crate::control::controller::FlightController;
use std::sync::Arc;

/// Reply sent when a command completed
pub const SUCCESS: &str = "success";

/// Replies `success` or an error line for every received command
///
/// `rc` and malformed lines are answered on the reader thread. Flight actions
/// are answered from their completion callback, so a slow `takeoff` never
/// holds back later commands and its reply may follow theirs.
pub struct ControlCommandHandler {
    controller: Arc<dyn FlightController>,
}

impl ControlCommandHandler {
    pub fn new(controller: Arc<dyn FlightController>) -> Self {
        Self { controller }
    }

    /// Execute a command and hand its reply line to `reply` once known
    pub fn execute(&self, line: &str, reply: impl FnOnce(String) + Send + 'static) {
        let command = match ControlCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                log::debug!("Rejected command {:?}: {}", line, e);
                reply(e.to_string());
                return;
            }
        };

        let pending = match command {
            ControlCommand::Enable => self.controller.enable_sticks(),
            ControlCommand::Disable => self.controller.disable_sticks(),
            ControlCommand::Takeoff => self.controller.takeoff(),
            ControlCommand::Land => self.controller.land(),
            ControlCommand::Rc(sticks) => {
                self.controller.set_sticks(sticks);
                reply(SUCCESS.to_string());
                return;
            }
        };

        let action = pending.action();
        pending.on_complete(move |result| match result {
            Ok(()) => reply(SUCCESS.to_string()),
            Err(e) => {
                log::warn!("Action {} failed: {}", action, e);
                reply(e.to_string());
            }
        });
    }
}

impl CommandHandler for ControlCommandHandler {
    fn on_command(&self, server: &ServerHandle, command: &str) {
        log::debug!("Control command: {}", command);
        let server = server.clone();
        self.execute(command, move |reply| server.send_message(reply));
    }
}
