use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedAction {
    On,
    Off,
    Toggle,
}

impl LedAction {
    pub fn resolve(self, current: bool) -> bool {
        match self {
            LedAction::On => true,
            LedAction::Off => false,
            LedAction::Toggle => !current,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Led(LedAction),
    Brightness(u8),
    /// Burst of slider positions, as produced by dragging.
    Drag(Vec<u8>),
    State,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("usage: led on|off|toggle")]
    LedUsage,
    #[error("usage: b <0-100>")]
    BrightnessUsage,
    #[error("brightness must be 0..=100, got {0}")]
    OutOfRange(String),
    #[error("usage: drag <v> [v ...]")]
    DragUsage,
}

pub const HELP: &str = "commands: led on|off|toggle, b <0-100>, drag <v>..., state, help, quit";

fn level(word: &str) -> Result<u8, InputError> {
    match word.parse::<u8>() {
        Ok(v) if v <= 100 => Ok(v),
        _ => Err(InputError::OutOfRange(word.to_string())),
    }
}

pub fn parse(line: &str) -> Result<Option<Input>, InputError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let input = match head.to_ascii_lowercase().as_str() {
        "led" => match rest.as_slice() {
            ["on"] => Input::Led(LedAction::On),
            ["off"] => Input::Led(LedAction::Off),
            ["toggle"] | [] => Input::Led(LedAction::Toggle),
            _ => return Err(InputError::LedUsage),
        },
        "b" | "brightness" => match rest.as_slice() {
            [value] => Input::Brightness(level(value)?),
            _ => return Err(InputError::BrightnessUsage),
        },
        "drag" => {
            if rest.is_empty() {
                return Err(InputError::DragUsage);
            }
            Input::Drag(rest.iter().map(|w| level(w)).collect::<Result<_, _>>()?)
        }
        "state" | "s" => Input::State,
        "help" | "?" => Input::Help,
        "quit" | "q" | "exit" => Input::Quit,
        other => return Err(InputError::Unknown(other.to_string())),
    };
    Ok(Some(input))
}
