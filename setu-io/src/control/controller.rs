//! Flight controller boundary
//!
//! [`FlightController`] is the seam to the vendor flight SDK. Long-running
//! actions complete asynchronously: each call returns a [`PendingAction`]
//! that resolves once the aircraft reports success or failure, on whatever
//! thread the SDK calls back from.

use crate::control::command::Sticks;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Asynchronous actions a flight controller performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightAction {
    EnableSticks,
    DisableSticks,
    Takeoff,
    Land,
}

impl fmt::Display for FlightAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlightAction::EnableSticks => "enable",
            FlightAction::DisableSticks => "disable",
            FlightAction::Takeoff => "takeoff",
            FlightAction::Land => "land",
        };
        write!(f, "{}", name)
    }
}

/// Failure of a flight action; the display text is sent to the client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The aircraft refused or failed the action
    #[error("{0}")]
    Rejected(String),

    #[error("Timed out waiting for {0}")]
    TimedOut(FlightAction),

    /// The controller dropped the action without completing it
    #[error("Action {0} was abandoned")]
    Abandoned(FlightAction),
}

type ActionResult = Result<(), ActionError>;
type Callback = Box<dyn FnOnce(ActionResult) + Send>;

enum Slot {
    /// Not resolved yet, with the callback to run once it is
    Waiting(Option<Callback>),
    /// Resolved before anyone asked for the result
    Resolved(ActionResult),
    /// Result handed out
    Taken,
}

struct Shared {
    action: FlightAction,
    slot: Mutex<Slot>,
    resolved: Condvar,
}

/// Completion side of a [`PendingAction`]
///
/// Dropping a completer that never resolved its action resolves it with
/// [`ActionError::Abandoned`].
pub struct ActionCompleter {
    shared: Arc<Shared>,
}

impl ActionCompleter {
    /// Resolve the action. Later calls are ignored.
    ///
    /// A registered completion callback runs on the calling thread.
    pub fn complete(&self, result: ActionResult) {
        let mut slot = self.shared.slot.lock();
        match mem::replace(&mut *slot, Slot::Taken) {
            Slot::Waiting(Some(callback)) => {
                drop(slot);
                callback(result);
            }
            Slot::Waiting(None) => {
                *slot = Slot::Resolved(result);
                self.shared.resolved.notify_all();
            }
            done => *slot = done,
        }
    }

    pub fn succeed(&self) {
        self.complete(Ok(()));
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.complete(Err(ActionError::Rejected(reason.into())));
    }
}

impl Drop for ActionCompleter {
    fn drop(&mut self) {
        self.complete(Err(ActionError::Abandoned(self.shared.action)));
    }
}

/// An action in flight, resolved by its [`ActionCompleter`]
pub struct PendingAction {
    shared: Arc<Shared>,
}

impl PendingAction {
    /// Create a linked completer/pending pair
    pub fn channel(action: FlightAction) -> (ActionCompleter, PendingAction) {
        let shared = Arc::new(Shared {
            action,
            slot: Mutex::new(Slot::Waiting(None)),
            resolved: Condvar::new(),
        });
        (
            ActionCompleter {
                shared: Arc::clone(&shared),
            },
            PendingAction { shared },
        )
    }

    /// An action that has already finished with `result`
    pub fn resolved(action: FlightAction, result: ActionResult) -> Self {
        let (completer, pending) = Self::channel(action);
        completer.complete(result);
        pending
    }

    pub fn action(&self) -> FlightAction {
        self.shared.action
    }

    /// Run `callback` with the result once the action resolves
    ///
    /// Runs immediately on the calling thread when the action has already
    /// resolved, otherwise on the thread that completes it. Never blocks.
    pub fn on_complete(self, callback: impl FnOnce(ActionResult) + Send + 'static) {
        let mut slot = self.shared.slot.lock();
        match mem::replace(&mut *slot, Slot::Taken) {
            Slot::Resolved(result) => {
                drop(slot);
                callback(result);
            }
            Slot::Waiting(_) => *slot = Slot::Waiting(Some(Box::new(callback))),
            Slot::Taken => {}
        }
    }

    /// Block until the action resolves or `timeout` elapses
    pub fn wait(self, timeout: Duration) -> ActionResult {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.slot.lock();
        loop {
            match mem::replace(&mut *slot, Slot::Taken) {
                Slot::Resolved(result) => return result,
                pending => *slot = pending,
            }
            if Instant::now() >= deadline {
                return Err(ActionError::TimedOut(self.shared.action));
            }
            self.shared.resolved.wait_until(&mut slot, deadline);
        }
    }
}

/// Flight control operations driven by the control channel
pub trait FlightController: Send + Sync {
    fn enable_sticks(&self) -> PendingAction;

    fn disable_sticks(&self) -> PendingAction;

    fn takeoff(&self) -> PendingAction;

    fn land(&self) -> PendingAction;

    /// Apply stick positions immediately; ignored while sticks are disabled
    fn set_sticks(&self, sticks: Sticks);
}

#[derive(Debug, Default)]
struct SimulatedState {
    sticks_enabled: bool,
    airborne: bool,
    sticks: Sticks,
}

/// In-process flight controller used when no aircraft is connected
///
/// Tracks stick and flight state and resolves every action immediately.
#[derive(Debug, Default)]
pub struct SimulatedFlightController {
    state: Mutex<SimulatedState>,
}

impl SimulatedFlightController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sticks_enabled(&self) -> bool {
        self.state.lock().sticks_enabled
    }

    pub fn is_airborne(&self) -> bool {
        self.state.lock().airborne
    }

    /// Last applied stick positions
    pub fn sticks(&self) -> Sticks {
        self.state.lock().sticks
    }
}

impl FlightController for SimulatedFlightController {
    fn enable_sticks(&self) -> PendingAction {
        self.state.lock().sticks_enabled = true;
        log::info!("Virtual sticks enabled");
        PendingAction::resolved(FlightAction::EnableSticks, Ok(()))
    }

    fn disable_sticks(&self) -> PendingAction {
        let mut state = self.state.lock();
        state.sticks_enabled = false;
        state.sticks = Sticks::default();
        log::info!("Virtual sticks disabled");
        PendingAction::resolved(FlightAction::DisableSticks, Ok(()))
    }

    fn takeoff(&self) -> PendingAction {
        let mut state = self.state.lock();
        let result = if state.airborne {
            Err(ActionError::Rejected("Aircraft is already flying".to_string()))
        } else {
            state.airborne = true;
            log::info!("Takeoff");
            Ok(())
        };
        PendingAction::resolved(FlightAction::Takeoff, result)
    }

    fn land(&self) -> PendingAction {
        let mut state = self.state.lock();
        let result = if state.airborne {
            state.airborne = false;
            log::info!("Landing");
            Ok(())
        } else {
            Err(ActionError::Rejected("Aircraft is not flying".to_string()))
        };
        PendingAction::resolved(FlightAction::Land, result)
    }

    fn set_sticks(&self, sticks: Sticks) {
        let mut state = self.state.lock();
        if !state.sticks_enabled {
            log::debug!("Ignoring sticks while virtual sticks are disabled");
            return;
        }
        log::debug!(
            "Sticks: left {}, {} right {}, {}",
            sticks.left_horizontal,
            sticks.left_vertical,
            sticks.right_horizontal,
            sticks.right_vertical
        );
        state.sticks = sticks;
    }
}
