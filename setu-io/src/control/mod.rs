//! Flight control over the command channel
//!
//! ```text
//! "rc 0.5 0 0 -0.2" ──► ControlCommand::parse ──► FlightController ──► "success"
//! ```

pub mod command;
pub mod controller;
pub mod handler;

pub use command::{ControlCommand, ParseError, STICK_MAX, StickPosition, Sticks};
pub use controller::{
    ActionCompleter, ActionError, FlightAction, FlightController, PendingAction,
    SimulatedFlightController,
};
pub use handler::{ControlCommandHandler, SUCCESS};
