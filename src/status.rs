/// supervisor status structs
///
use serde::{Deserialize, Serialize};

pub type JsonString = String;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupervisorState {
    #[default]
    Idle,
    Busy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorStatus {
    pub name: String,
    pub state: SupervisorState,
    pub uptime: String,
    pub active: usize,
    pub spawned: u64,
    pub failed: u64,
}

impl SupervisorStatus {
    pub fn new(
        name: String,
        uptime: String,
        active: usize,
        spawned: u64,
        failed: u64,
    ) -> SupervisorStatus {
        let state = if active == 0 {
            SupervisorState::Idle
        } else {
            SupervisorState::Busy
        };

        SupervisorStatus {
            name,
            state,
            uptime,
            active,
            spawned,
            failed,
        }
    }

    /// the status as json; serialization errors are folded into the message
    pub fn to_json(&self) -> JsonString {
        match serde_json::to_string(self) {
            Ok(js) => js,
            Err(e) => format!(r#"{}"status":"json parse error: {:?}"{}"#, "{", e, "}"),
        }
    }
}
