//! Control command parsing
//!
//! # Command Format
//!
//! Case-insensitive, whitespace-separated:
//!
//! | Command | Arguments | Effect |
//! |---------|-----------|--------|
//! | `enable` | - | Enable virtual stick control |
//! | `disable` | - | Disable virtual stick control |
//! | `takeoff` | - | Start auto takeoff |
//! | `land` | - | Start auto landing |
//! | `rc` | `lh lv rh rv` | Set both sticks, each value in [-1.0, 1.0] |

use std::fmt;
use std::str::FromStr;

/// Full deflection of a stick axis in controller units
pub const STICK_MAX: i16 = 660;

/// One stick axis position in controller units (-660..=660)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StickPosition(i16);

impl StickPosition {
    pub const CENTER: StickPosition = StickPosition(0);

    /// Convert a unit deflection in [-1.0, 1.0] to controller units
    ///
    /// Values that are not finite or lie outside the range center the stick.
    /// In-range values are scaled and truncated toward zero.
    pub fn from_unit(value: f32) -> Self {
        if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
            return Self::CENTER;
        }
        StickPosition((value * STICK_MAX as f32).trunc() as i16)
    }

    pub fn value(self) -> i16 {
        self.0
    }
}

impl fmt::Display for StickPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Positions of both virtual sticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sticks {
    pub left_horizontal: StickPosition,
    pub left_vertical: StickPosition,
    pub right_horizontal: StickPosition,
    pub right_vertical: StickPosition,
}

impl Sticks {
    /// Build from unit deflections (left h, left v, right h, right v)
    pub fn from_units(lh: f32, lv: f32, rh: f32, rv: f32) -> Self {
        Self {
            left_horizontal: StickPosition::from_unit(lh),
            left_vertical: StickPosition::from_unit(lv),
            right_horizontal: StickPosition::from_unit(rh),
            right_vertical: StickPosition::from_unit(rv),
        }
    }
}

/// A parsed control command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Enable,
    Disable,
    Takeoff,
    Land,
    Rc(Sticks),
}

/// Why a command line was rejected; the display text is sent to the client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Illegal arguments: {0}")]
    IllegalArguments(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl ControlCommand {
    /// Parse one command line
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim().to_lowercase();
        let mut words = line.split_whitespace();
        let keyword = words.next().unwrap_or("");

        match keyword {
            "enable" => Ok(ControlCommand::Enable),
            "disable" => Ok(ControlCommand::Disable),
            "takeoff" => Ok(ControlCommand::Takeoff),
            "land" => Ok(ControlCommand::Land),
            "rc" => {
                let values = words
                    .map(f32::from_str)
                    .collect::<Result<Vec<f32>, _>>()
                    .map_err(|_| ParseError::IllegalArguments(line.clone()))?;
                match values[..] {
                    [lh, lv, rh, rv] => Ok(ControlCommand::Rc(Sticks::from_units(lh, lv, rh, rv))),
                    _ => Err(ParseError::IllegalArguments(line.clone())),
                }
            }
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

impl FromStr for ControlCommand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stick_scaling() {
        assert_eq!(StickPosition::from_unit(1.0).value(), 660);
        assert_eq!(StickPosition::from_unit(-1.0).value(), -660);
        assert_eq!(StickPosition::from_unit(0.5).value(), 330);
        assert_eq!(StickPosition::from_unit(0.001).value(), 0);
        // 0.9999 * 660 = 659.93 truncates toward zero
        assert_eq!(StickPosition::from_unit(0.9999).value(), 659);
        assert_eq!(StickPosition::from_unit(-0.9999).value(), -659);
    }

    #[test]
    fn test_stick_out_of_range_centers() {
        assert_eq!(StickPosition::from_unit(1.5), StickPosition::CENTER);
        assert_eq!(StickPosition::from_unit(-1.01), StickPosition::CENTER);
        assert_eq!(StickPosition::from_unit(f32::NAN), StickPosition::CENTER);
        assert_eq!(StickPosition::from_unit(f32::INFINITY), StickPosition::CENTER);
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(ControlCommand::parse("enable"), Ok(ControlCommand::Enable));
        assert_eq!(ControlCommand::parse("  DISABLE \r"), Ok(ControlCommand::Disable));
        assert_eq!(ControlCommand::parse("TakeOff"), Ok(ControlCommand::Takeoff));
        assert_eq!(ControlCommand::parse("land now"), Ok(ControlCommand::Land));
    }

    #[test]
    fn test_parse_rc() {
        let cmd: ControlCommand = "rc 0.5 -0.5 1 2".parse().unwrap();
        let ControlCommand::Rc(sticks) = cmd else {
            panic!("expected rc, got {:?}", cmd);
        };
        assert_eq!(sticks.left_horizontal.value(), 330);
        assert_eq!(sticks.left_vertical.value(), -330);
        assert_eq!(sticks.right_horizontal.value(), 660);
        assert_eq!(sticks.right_vertical.value(), 0);
    }

    #[test]
    fn test_parse_rc_illegal_arguments() {
        assert_eq!(
            ControlCommand::parse("rc 0 0 0"),
            Err(ParseError::IllegalArguments("rc 0 0 0".to_string()))
        );
        assert_eq!(
            ControlCommand::parse("RC 0 0 0 up").unwrap_err().to_string(),
            "Illegal arguments: rc 0 0 0 up"
        );
        assert!(ControlCommand::parse("rc 0 0 0 0 0").is_err());
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            ControlCommand::parse("hover 10").unwrap_err().to_string(),
            "Unknown command: hover"
        );
        assert_eq!(
            ControlCommand::parse("").unwrap_err(),
            ParseError::UnknownCommand(String::new())
        );
    }
}
