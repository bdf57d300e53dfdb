use serde::{Deserialize, Serialize};

// Outbound control frames understood by the device firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundCommand {
    Hello,
    SetLed1 { value: bool },
    SetBrightness { value: u8 }, // 0..=100
}

impl OutboundCommand {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
