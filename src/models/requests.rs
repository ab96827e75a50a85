use serde::Deserialize;

use super::session::RecorderMode;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub mode: RecorderMode,
    /// Page to open; recorded as the first `go_to` in write mode
    pub start_url: Option<String>,
    /// Action list to replay (read mode)
    pub script_path: Option<String>,
    /// Where the action list is written (write mode); defaults under the output dir
    pub output_path: Option<String>,
    /// Name stored in the action list
    pub name: Option<String>,
    pub headless: Option<bool>,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: i32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: i32,
    pub continue_on_error: Option<bool>,
    /// Optional client ID for tracking which client started the session
    /// Used for cleanup when client disconnects
    pub client_id: Option<String>,
}

fn default_viewport_width() -> i32 {
    1280
}
fn default_viewport_height() -> i32 {
    720
}

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TypeRequest {
    pub text: String,
    /// Label, placeholder, aria label or name of the field
    pub field: String,
}

#[derive(Debug, Deserialize)]
pub struct PressRequest {
    pub key: String,
}
