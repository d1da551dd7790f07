//! Linux evdev input and uinput output.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, EventType, InputEvent, Key, RelativeAxisType};
use parking_lot::Mutex;

use crate::keys::{self, KeyEvent, KeyValue};
use crate::vkbd::KeySink;
use crate::vmouse::PointerSink;

/// Display name of the virtual keyboard. Also serves as the marker another
/// instance looks for before grabbing devices.
pub const VIRTUAL_KEYBOARD_NAME: &str = "mouseless";
pub const VIRTUAL_MOUSE_NAME: &str = "mouseless mouse";

const RETRY_INTERVAL: Duration = Duration::from_secs(5);

// ------------------ device scanning --------------------

/// Enumerates input devices that look like keyboards: anything advertising
/// an A key or a keypad 1 key. This filters out mice and special-purpose
/// HIDs that expose only buttons.
pub fn scan_keyboard_devices() -> Vec<(PathBuf, String)> {
    let mut found: Vec<(PathBuf, String)> = evdev::enumerate()
        .filter(|(_, dev)| {
            dev.supported_keys().map_or(false, |keys| {
                keys.contains(Key::KEY_A) || keys.contains(Key::KEY_KP1)
            })
        })
        .map(|(path, dev)| {
            let name = dev.name().unwrap_or("?").to_string();
            (path, name)
        })
        .collect();
    found.sort();
    found
}

// ------------------ reader --------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DeviceState {
    NotOpen,
    OpenFailed,
    Open,
}

struct ReaderStatus {
    state: DeviceState,
    last_error: String,
}

/// Handle to a per-device reader thread. The thread owns the open/grab/read
/// lifecycle and keeps retrying while the device is missing or disconnects.
pub struct DeviceReader {
    path: String,
    status: Arc<Mutex<ReaderStatus>>,
}

impl DeviceReader {
    pub fn spawn(path: String, events: Sender<KeyEvent>) -> DeviceReader {
        let status = Arc::new(Mutex::new(ReaderStatus {
            state: DeviceState::NotOpen,
            last_error: String::new(),
        }));
        let thread_status = status.clone();
        let thread_path = path.clone();
        thread::spawn(move || read_loop(&thread_path, events, thread_status));
        DeviceReader { path, status }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.status.lock().state == DeviceState::Open
    }

    pub fn last_error(&self) -> String {
        self.status.lock().last_error.clone()
    }
}

fn read_loop(path: &str, events: Sender<KeyEvent>, status: Arc<Mutex<ReaderStatus>>) {
    loop {
        let mut device = match open_device(path) {
            Ok(device) => device,
            Err(e) => {
                let mut st = status.lock();
                // the first failure of a down-period is warned about,
                // repeats are only visible in debug output
                if st.state == DeviceState::OpenFailed {
                    log::debug!("Failed to open {path}: {e}");
                } else {
                    log::warn!("Failed to open {path}: {e}");
                }
                st.state = DeviceState::OpenFailed;
                st.last_error = e.to_string();
                drop(st);
                thread::sleep(RETRY_INTERVAL);
                continue;
            }
        };
        status.lock().state = DeviceState::Open;

        loop {
            let batch = match device.fetch_events() {
                Ok(fetched) => fetched.collect::<Vec<_>>(),
                Err(e) => {
                    log::warn!("Failed to read {path}: {e}");
                    let mut st = status.lock();
                    st.state = DeviceState::NotOpen;
                    st.last_error = e.to_string();
                    break;
                }
            };
            let now = Instant::now();
            for ev in batch {
                if ev.event_type() != EventType::KEY {
                    continue;
                }
                // 0 = release, 1 = press; autorepeat (2) is dropped
                let value = ev.value();
                if value != 0 && value != 1 {
                    continue;
                }
                let code = ev.code();
                log::debug!(
                    "{} {} ({})",
                    if value == 1 { "Pressed: " } else { "Released:" },
                    keys::key_alias(code).unwrap_or("?"),
                    code
                );
                let event = KeyEvent::new(code, KeyValue::from(value), now);
                if events.send(event).is_err() {
                    return;
                }
            }
        }
        thread::sleep(RETRY_INTERVAL);
    }
}

fn open_device(path: &str) -> io::Result<Device> {
    log::debug!("opening the keyboard device {path}");
    let mut device = Device::open(path)?;
    device.grab()?;
    log::debug!("Device name: {}", device.name().unwrap_or("?"));
    let id = device.input_id();
    log::debug!(
        "Device info: bus {:?}, vendor {:#06x}, product {:#06x}, version {:#06x}",
        id.bus_type(),
        id.vendor(),
        id.product(),
        id.version()
    );
    Ok(device)
}

// ------------------ uinput keyboard --------------------

pub struct UinputKeyboard {
    device: VirtualDevice,
}

impl UinputKeyboard {
    /// Creates the virtual keyboard. It advertises the whole basic key range
    /// plus every code the configuration can emit.
    pub fn new(extra_codes: impl IntoIterator<Item = u16>) -> io::Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for code in 0..256u16 {
            keys.insert(Key(code));
        }
        for code in extra_codes {
            keys.insert(Key(code));
        }
        let device = VirtualDeviceBuilder::new()?
            .name(VIRTUAL_KEYBOARD_NAME)
            .input_id(evdev::InputId::new(evdev::BusType::BUS_USB, 1, 1, 1))
            .with_keys(&keys)?
            .build()?;
        log::info!("Created virtual keyboard {VIRTUAL_KEYBOARD_NAME}");
        Ok(Self { device })
    }

    fn write_key(&mut self, code: u16, value: i32) -> io::Result<()> {
        self.device
            .emit(&[InputEvent::new(EventType::KEY, code, value)])
    }
}

impl KeySink for UinputKeyboard {
    fn press(&mut self, code: u16) -> io::Result<()> {
        self.write_key(code, 1)
    }

    fn release(&mut self, code: u16) -> io::Result<()> {
        self.write_key(code, 0)
    }
}

// ------------------ uinput mouse --------------------

pub struct UinputMouse {
    device: VirtualDevice,
}

impl UinputMouse {
    pub fn new() -> io::Result<Self> {
        let mut buttons = AttributeSet::<Key>::new();
        for code in Key::BTN_LEFT.0..=Key::BTN_TASK.0 {
            buttons.insert(Key(code));
        }
        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);
        axes.insert(RelativeAxisType::REL_HWHEEL);
        let device = VirtualDeviceBuilder::new()?
            .name(VIRTUAL_MOUSE_NAME)
            .with_keys(&buttons)?
            .with_relative_axes(&axes)?
            .build()?;
        log::info!("Created virtual mouse {VIRTUAL_MOUSE_NAME}");
        Ok(Self { device })
    }
}

impl PointerSink for UinputMouse {
    fn motion(&mut self, dx: i32, dy: i32) -> io::Result<()> {
        self.device.emit(&[
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_X.0, dx),
            InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_Y.0, dy),
        ])
    }

    fn wheel(&mut self, x: i32, y: i32) -> io::Result<()> {
        let mut events = Vec::with_capacity(2);
        if x != 0 {
            events.push(InputEvent::new(
                EventType::RELATIVE,
                RelativeAxisType::REL_HWHEEL.0,
                x,
            ));
        }
        if y != 0 {
            // REL_WHEEL is positive upwards, the engine's y grows downward
            events.push(InputEvent::new(
                EventType::RELATIVE,
                RelativeAxisType::REL_WHEEL.0,
                -y,
            ));
        }
        self.device.emit(&events)
    }

    fn press_button(&mut self, button: u16) -> io::Result<()> {
        self.device
            .emit(&[InputEvent::new(EventType::KEY, button, 1)])
    }

    fn release_button(&mut self, button: u16) -> io::Result<()> {
        self.device
            .emit(&[InputEvent::new(EventType::KEY, button, 0)])
    }
}
