//! Input Injector: synthesises the copy and paste shortcuts.
//!
//! Delivery only means the events reached the OS input queue. Whether the
//! focused application acted on them has to be checked separately, for example
//! by polling the clipboard after a copy.

use crate::errors::InjectionError;
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use log::{debug, warn};
use std::sync::Mutex;
use std::time::Duration;

#[cfg(target_os = "linux")]
use crate::utils::{is_tool_available, is_wayland};
#[cfg(target_os = "linux")]
use log::info;
#[cfg(target_os = "linux")]
use std::process::Command;

pub trait InputPort: Send + Sync {
    /// Sends modifier-down, C-down, C-up, modifier-up, then waits for the settle delay.
    fn simulate_copy(&self) -> bool;
    /// Same gesture shape with V.
    fn simulate_paste(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Copy,
    Paste,
}

impl Gesture {
    pub fn name(self) -> &'static str {
        match self {
            Gesture::Copy => "copy",
            Gesture::Paste => "paste",
        }
    }

    fn key(self) -> char {
        match self {
            Gesture::Copy => 'c',
            Gesture::Paste => 'v',
        }
    }

    /// Linux input event keycodes for ydotool: ctrl=29, c=46, v=47.
    #[cfg(target_os = "linux")]
    fn ydotool_sequence(self) -> [&'static str; 4] {
        match self {
            Gesture::Copy => ["29:1", "46:1", "46:0", "29:0"],
            Gesture::Paste => ["29:1", "47:1", "47:0", "29:0"],
        }
    }
}

#[cfg(target_os = "macos")]
const SHORTCUT_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const SHORTCUT_MODIFIER: Key = Key::Control;

/// Injector backed by enigo, with native helper tools preferred on Linux.
///
/// The enigo connection is only opened the first time a gesture falls back to
/// it, so a Wayland session served entirely by wtype/ydotool never needs one.
pub struct EnigoInput {
    enigo: Mutex<Option<Enigo>>,
    settle: Duration,
}

impl EnigoInput {
    pub fn new(settle: Duration) -> Self {
        Self {
            enigo: Mutex::new(None),
            settle,
        }
    }

    fn inject(&self, gesture: Gesture) -> bool {
        let delivered = match self.send(gesture) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send {} gesture: {}", gesture.name(), e);
                false
            }
        };
        std::thread::sleep(self.settle);
        delivered
    }

    fn send(&self, gesture: Gesture) -> Result<(), String> {
        #[cfg(target_os = "linux")]
        let handled = try_send_gesture_linux(gesture)?;
        #[cfg(not(target_os = "linux"))]
        let handled = false;

        if handled {
            return Ok(());
        }

        let mut slot = self.enigo.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            debug!("Initialising enigo for {} gesture", gesture.name());
            *slot = Some(open_enigo().map_err(|e| e.to_string())?);
        }
        match slot.as_mut() {
            Some(enigo) => send_gesture_enigo(enigo, gesture),
            None => Err("enigo unavailable".to_string()),
        }
    }

    #[cfg(test)]
    fn backend_open(&self) -> bool {
        self.enigo
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

fn open_enigo() -> Result<Enigo, InjectionError> {
    Enigo::new(&Settings::default()).map_err(|e| InjectionError::Backend(e.to_string()))
}

impl InputPort for EnigoInput {
    fn simulate_copy(&self) -> bool {
        self.inject(Gesture::Copy)
    }

    fn simulate_paste(&self) -> bool {
        self.inject(Gesture::Paste)
    }
}

/// Four key events. The modifier is released even when the key events fail so a
/// stuck Ctrl is never left behind.
fn send_gesture_enigo(enigo: &mut Enigo, gesture: Gesture) -> Result<(), String> {
    enigo
        .key(SHORTCUT_MODIFIER, Direction::Press)
        .map_err(|e| format!("Failed to press modifier: {}", e))?;

    let key = Key::Unicode(gesture.key());
    let result = enigo
        .key(key, Direction::Press)
        .and_then(|()| enigo.key(key, Direction::Release))
        .map_err(|e| format!("Failed to send {} key: {}", gesture.name(), e));

    let release = enigo
        .key(SHORTCUT_MODIFIER, Direction::Release)
        .map_err(|e| format!("Failed to release modifier: {}", e));

    result.and(release)?;
    debug!("{} gesture sent via enigo", gesture.name());
    Ok(())
}

/// Attempts to send the gesture with Linux-native tools.
/// Returns `Ok(true)` if a native tool handled it, `Ok(false)` to fall back to enigo.
#[cfg(target_os = "linux")]
fn try_send_gesture_linux(gesture: Gesture) -> Result<bool, String> {
    if is_wayland() {
        // Wayland: prefer wtype, then ydotool
        if is_tool_available("wtype") {
            info!("Using wtype for {} gesture", gesture.name());
            let key = gesture.key().to_string();
            run_tool("wtype", &["-M", "ctrl", "-k", key.as_str(), "-m", "ctrl"])?;
            return Ok(true);
        }
        if is_tool_available("ydotool") {
            info!("Using ydotool for {} gesture", gesture.name());
            let mut args = vec!["key"];
            args.extend(gesture.ydotool_sequence());
            run_tool("ydotool", &args)?;
            return Ok(true);
        }
    } else if is_tool_available("xdotool") {
        info!("Using xdotool for {} gesture", gesture.name());
        let combo = format!("ctrl+{}", gesture.key());
        run_tool("xdotool", &["key", "--clearmodifiers", combo.as_str()])?;
        return Ok(true);
    }

    Ok(false)
}

#[cfg(target_os = "linux")]
fn run_tool(tool: &str, args: &[&str]) -> Result<(), String> {
    let output = Command::new(tool)
        .args(args)
        .output()
        .map_err(|e| format!("Failed to execute {}: {}", tool, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{} failed: {}", tool, stderr));
    }

    Ok(())
}
