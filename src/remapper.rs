//! Implements the glue between disambiguated key events and the virtual
//! devices: binding resolution under the active layer, the momentary layer
//! stack, and the fixed-tick mouse loop.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use crossbeam_channel::{after, never, select, Receiver, Sender};
use evdev::Key;
use parking_lot::Mutex;

use crate::cfg::{Binding, Config};
use crate::keys::{self, KeyEvent, WILDCARD_KEY};
use crate::oskbd::DeviceReader;
use crate::taphold::{ControlMsg, SharedLayerView};
use crate::vkbd::{KeySink, VirtualKeyboard};
use crate::vmouse::{PointerSink, VirtualMouse};

pub const MOUSE_LOOP_INTERVAL: Duration = Duration::from_millis(20);

const NO_DEVICE_WAIT: Duration = Duration::from_secs(10);

pub struct Remapper<K: KeySink, P: PointerSink> {
    pub cfg_path: PathBuf,
    pub config: Arc<Config>,
    pub current_layer: usize,
    /// Keys that pushed a momentary layer, and the layer to return to when
    /// each of them is released. Always the same length.
    pub toggle_keys: Vec<u16>,
    pub previous_layers: Vec<usize>,
    pub keyboard: VirtualKeyboard<K>,
    pub mouse: VirtualMouse<P>,
    layer_view: SharedLayerView,
    pressed: Arc<Mutex<HashSet<u16>>>,
    control: Sender<ControlMsg>,
    events: Receiver<KeyEvent>,
    readers: Vec<DeviceReader>,
}

impl<K: KeySink, P: PointerSink> Remapper<K, P> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg_path: PathBuf,
        config: Arc<Config>,
        keyboard: VirtualKeyboard<K>,
        mouse: VirtualMouse<P>,
        events: Receiver<KeyEvent>,
        control: Sender<ControlMsg>,
        pressed: Arc<Mutex<HashSet<u16>>>,
        layer_view: SharedLayerView,
        readers: Vec<DeviceReader>,
    ) -> Self {
        let remapper = Self {
            cfg_path,
            config,
            current_layer: 0,
            toggle_keys: Vec::new(),
            previous_layers: Vec::new(),
            keyboard,
            mouse,
            layer_view,
            pressed,
            control,
            events,
            readers,
        };
        remapper.publish_layer();
        remapper
    }

    /// The main loop: handles disambiguated key events and drives the mouse
    /// tick. The tick timer is only armed while some held binding moves or
    /// scrolls, or residual velocity remains; otherwise the loop parks until
    /// the next key event.
    pub fn run(&mut self) -> Result<()> {
        let events = self.events.clone();
        let mut tick = never();
        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(event) => self.handle_key(&event)?,
                    Err(_) => bail!("event channel disconnected"),
                },
                recv(tick) -> _ => {}
            }
            self.check_devices_open();
            tick = if self.tick_mouse()? {
                after(MOUSE_LOOP_INTERVAL)
            } else {
                never()
            };
        }
    }

    /// Handles a single key event (press or release).
    pub fn handle_key(&mut self, event: &KeyEvent) -> Result<()> {
        let layer = &self.config.layers[self.current_layer];
        let mut binding = layer.bindings.get(&event.code).cloned();

        // switch to the first layer on escape, if not mapped to something else
        if binding.is_none()
            && event.code == Key::KEY_ESC.0
            && event.is_press()
            && self.current_layer != 0
        {
            binding = Some(Binding::Layer(self.config.layers[0].name.clone()));
        }

        // the wildcard binding covers keys without one of their own
        if binding.is_none() {
            binding = layer.wildcard.clone();
        }

        // no wildcard either: with pass-through the key maps to itself
        if binding.is_none() && layer.pass_through {
            binding = Some(Binding::Key {
                combo: vec![event.code],
            });
        }

        if !event.is_press() {
            // go back to the previous layer when a toggling key is released,
            // dropping every layer toggled after it as well
            if let Some(i) = self.toggle_keys.iter().position(|&k| k == event.code) {
                self.current_layer = self.previous_layers[i];
                log::debug!(
                    "Switching to layer {}",
                    self.config.layers[self.current_layer].name
                );
                self.toggle_keys.truncate(i);
                self.previous_layers.truncate(i);
                self.publish_layer();
            }

            // mirror the release onto everything this key owns
            self.keyboard.original_key_up(event.code)?;
            self.mouse.original_key_up(event.code)?;
        }

        if let Some(binding) = binding {
            self.execute_binding(event, &binding)?;
        }
        Ok(())
    }

    /// Does what needs to be done for the given binding. Move, scroll and
    /// speed bindings have no effect here; the mouse tick polls them while
    /// their key is held.
    fn execute_binding(&mut self, event: &KeyEvent, binding: &Binding) -> Result<()> {
        log::debug!("Executing {binding:?}");
        match binding {
            Binding::Multi(bindings) => {
                for b in bindings {
                    self.execute_binding(event, b)?;
                }
            }
            Binding::TapHold { tap, hold, .. } => {
                let face = if event.hold_key { hold } else { tap };
                self.execute_binding(event, face)?;
            }
            Binding::Layer(name) => {
                if event.is_press() {
                    // deactivate any toggled layers
                    self.toggle_keys.clear();
                    self.previous_layers.clear();
                    if let Some(i) = self.config.layer_index(name) {
                        log::debug!("Switching to layer {name}");
                        self.current_layer = i;
                    } else {
                        log::warn!("Unknown layer: {name}");
                    }
                    self.publish_layer();
                }
            }
            Binding::ToggleLayer(name) => {
                if event.is_press() {
                    if let Some(i) = self.config.layer_index(name) {
                        log::debug!("Switching to layer {name}");
                        self.toggle_keys.push(event.code);
                        self.previous_layers.push(self.current_layer);
                        self.current_layer = i;
                        self.publish_layer();
                    } else {
                        log::warn!("Unknown layer: {name}");
                    }
                }
            }
            Binding::ReloadConfig => {
                if event.is_press() {
                    self.reload_config();
                }
            }
            Binding::Key { combo } => {
                if event.is_press() {
                    // wildcards resolve to the key that was pressed
                    let combo: Vec<u16> = combo
                        .iter()
                        .map(|&code| if code == WILDCARD_KEY { event.code } else { code })
                        .collect();
                    self.keyboard.press_keys(event.code, &combo)?;
                }
            }
            Binding::Button(button) => {
                if event.is_press() {
                    self.mouse.button_press(event.code, *button)?;
                }
            }
            Binding::Exec(command) => {
                if event.is_press() {
                    exec_command(command, event.code);
                }
            }
            Binding::Move { .. } | Binding::Scroll { .. } | Binding::Speed(_) => {}
        }
        Ok(())
    }

    /// Re-reads the configuration file. The tap-hold queue is flushed either
    /// way; on a parse error the old configuration stays in effect.
    fn reload_config(&mut self) {
        let _ = self.control.send(ControlMsg::FlushPending);
        match Config::load(&self.cfg_path) {
            Err(e) => log::error!("Could not reload configuration: {e:#}"),
            Ok(config) => {
                self.config = Arc::new(config);
                self.current_layer = 0;
                self.toggle_keys.clear();
                self.previous_layers.clear();
                self.publish_layer();
                log::info!("Config reloaded");
                log::debug!(
                    "Switching to initial layer {}",
                    self.config.layers[0].name
                );
            }
        }
    }

    /// Runs one mouse tick: sums the move/scroll/speed contributions of all
    /// physically held keys on the active layer and feeds them to the mouse.
    /// Returns true if the tick timer should stay armed.
    pub fn tick_mouse(&mut self) -> Result<bool> {
        let mut move_x = 0.0;
        let mut move_y = 0.0;
        let mut scroll_x = 0.0;
        let mut scroll_y = 0.0;
        let mut speed_factor = 1.0;
        {
            let layer = &self.config.layers[self.current_layer];
            let pressed = self.pressed.lock();
            for (code, binding) in &layer.bindings {
                if !pressed.contains(code) {
                    continue;
                }
                match binding {
                    Binding::Move { x, y } => {
                        move_x += x;
                        move_y += y;
                    }
                    Binding::Scroll { x, y } => {
                        scroll_x += x;
                        scroll_y += y;
                    }
                    Binding::Speed(factor) => speed_factor *= factor,
                    _ => {}
                }
            }
        }

        if move_x == 0.0
            && move_y == 0.0
            && scroll_x == 0.0
            && scroll_y == 0.0
            && !self.mouse.is_moving()
        {
            return Ok(false);
        }

        let tick = MOUSE_LOOP_INTERVAL.as_secs_f64();
        let move_speed = self.config.base_mouse_speed * tick;
        let scroll_speed = self.config.base_scroll_speed * tick;
        let accel_step = tick * 1000.0 / self.config.mouse_acceleration_time;
        let decel_step = tick * 1000.0 / self.config.mouse_deceleration_time;
        self.mouse.scroll(
            scroll_x * scroll_speed * speed_factor,
            scroll_y * scroll_speed * speed_factor,
        )?;
        self.mouse.mouse_move(
            move_x * move_speed,
            move_y * move_speed,
            self.config.start_mouse_speed * tick,
            self.config.base_mouse_speed * tick,
            self.config.mouse_acceleration_curve,
            accel_step,
            self.config.mouse_deceleration_curve,
            decel_step,
            speed_factor,
        )?;
        Ok(true)
    }

    fn publish_layer(&self) {
        let mut view = self.layer_view.lock();
        view.config = self.config.clone();
        view.layer = self.current_layer;
    }

    fn check_devices_open(&self) {
        if self.readers.is_empty() || self.readers.iter().any(|r| r.is_open()) {
            return;
        }
        log::warn!("No keyboard device could be opened:");
        for (i, reader) in self.readers.iter().enumerate() {
            log::warn!("Device {}: {}: {}", i + 1, reader.path(), reader.last_error());
        }
        thread::sleep(NO_DEVICE_WAIT);
    }
}

/// Spawns a shell command on its own thread so a slow or failing command
/// cannot stall the event pipeline. The pressed key is passed in the
/// environment.
fn exec_command(command: &str, code: u16) {
    log::debug!("Executing: {command}");
    let key = keys::key_alias(code)
        .map(str::to_string)
        .unwrap_or_else(|| code.to_string());
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .env("key", key)
        .env("key_code", code.to_string());
    thread::spawn(move || match cmd.status() {
        Ok(status) if !status.success() => {
            log::warn!("Command exited with {status}");
        }
        Ok(_) => {}
        Err(e) => log::warn!("Execution of command failed: {e}"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyValue;
    use crate::taphold::LayerView;
    use crossbeam_channel::unbounded;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct SharedKeys(Rc<RefCell<Vec<(u16, bool)>>>);

    impl KeySink for SharedKeys {
        fn press(&mut self, code: u16) -> io::Result<()> {
            self.0.borrow_mut().push((code, true));
            Ok(())
        }
        fn release(&mut self, code: u16) -> io::Result<()> {
            self.0.borrow_mut().push((code, false));
            Ok(())
        }
    }

    #[derive(Debug, PartialEq)]
    enum PointerEvent {
        Motion(i32, i32),
        Wheel(i32, i32),
        Button(u16, bool),
    }

    #[derive(Clone, Default)]
    struct SharedPointer(Rc<RefCell<Vec<PointerEvent>>>);

    impl PointerSink for SharedPointer {
        fn motion(&mut self, dx: i32, dy: i32) -> io::Result<()> {
            self.0.borrow_mut().push(PointerEvent::Motion(dx, dy));
            Ok(())
        }
        fn wheel(&mut self, x: i32, y: i32) -> io::Result<()> {
            self.0.borrow_mut().push(PointerEvent::Wheel(x, y));
            Ok(())
        }
        fn press_button(&mut self, button: u16) -> io::Result<()> {
            self.0.borrow_mut().push(PointerEvent::Button(button, true));
            Ok(())
        }
        fn release_button(&mut self, button: u16) -> io::Result<()> {
            self.0.borrow_mut().push(PointerEvent::Button(button, false));
            Ok(())
        }
    }

    struct Fixture {
        remapper: Remapper<SharedKeys, SharedPointer>,
        keys: SharedKeys,
        pointer: SharedPointer,
        pressed: Arc<Mutex<HashSet<u16>>>,
        control_rx: Receiver<ControlMsg>,
    }

    fn fixture(yaml: &str) -> Fixture {
        let config = Arc::new(Config::parse(yaml).unwrap());
        let keys = SharedKeys::default();
        let pointer = SharedPointer::default();
        let (_events_tx, events_rx) = unbounded();
        let (control_tx, control_rx) = unbounded();
        let pressed = Arc::new(Mutex::new(HashSet::new()));
        let view = Arc::new(Mutex::new(LayerView {
            config: config.clone(),
            layer: 0,
        }));
        let remapper = Remapper::new(
            PathBuf::from("/nonexistent/mouseless.yaml"),
            config,
            VirtualKeyboard::new(keys.clone()),
            VirtualMouse::new(pointer.clone()),
            events_rx,
            control_tx,
            pressed.clone(),
            view,
            Vec::new(),
        );
        Fixture {
            remapper,
            keys,
            pointer,
            pressed,
            control_rx,
        }
    }

    fn press(code: u16) -> KeyEvent {
        KeyEvent::new(code, KeyValue::Press, Instant::now())
    }

    fn release(code: u16) -> KeyEvent {
        KeyEvent::new(code, KeyValue::Release, Instant::now())
    }

    fn hold(mut event: KeyEvent) -> KeyEvent {
        event.hold_key = true;
        event
    }

    #[test]
    fn passthrough_layer_forwards_keys() {
        let mut f = fixture("layers:\n  - name: initial\n");
        f.remapper.handle_key(&press(30)).unwrap();
        f.remapper.handle_key(&release(30)).unwrap();
        assert_eq!(*f.keys.0.borrow(), vec![(30, true), (30, false)]);
    }

    #[test]
    fn unmapped_key_without_passthrough_is_dropped() {
        let yaml = "layers:\n  - name: initial\n    passThrough: false\n";
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(30)).unwrap();
        f.remapper.handle_key(&release(30)).unwrap();
        assert!(f.keys.0.borrow().is_empty());
    }

    #[test]
    fn wildcard_binding_substitutes_pressed_key() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      "*": "leftshift+*"
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(30)).unwrap();
        f.remapper.handle_key(&release(30)).unwrap();
        assert_eq!(
            *f.keys.0.borrow(),
            vec![(42, true), (30, true), (30, false), (42, false)]
        );
    }

    #[test]
    fn tap_hold_selects_face_by_hold_flag() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      z: "tap-hold ; a ; toggle-layer nav"
  - name: nav
    bindings:
      d: right
"#;
        let mut f = fixture(yaml);
        // tap: behaves like the tap face
        f.remapper.handle_key(&press(44)).unwrap();
        f.remapper.handle_key(&release(44)).unwrap();
        assert_eq!(*f.keys.0.borrow(), vec![(30, true), (30, false)]);
        assert_eq!(f.remapper.current_layer, 0);

        // hold: pushes the momentary layer instead
        f.keys.0.borrow_mut().clear();
        f.remapper.handle_key(&hold(press(44))).unwrap();
        assert_eq!(f.remapper.current_layer, 1);
        f.remapper.handle_key(&press(32)).unwrap();
        f.remapper.handle_key(&release(32)).unwrap();
        f.remapper.handle_key(&hold(release(44))).unwrap();
        assert_eq!(f.remapper.current_layer, 0);
        assert_eq!(
            *f.keys.0.borrow(),
            vec![(106, true), (106, false)] // right arrow
        );
    }

    #[test]
    fn toggle_release_pops_cascading_layers() {
        let yaml = r#"
layers:
  - name: L0
    bindings:
      capslock: "toggle-layer L1"
  - name: L1
    bindings:
      f1: "toggle-layer L2"
  - name: L2
    bindings: {}
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(58)).unwrap();
        f.remapper.handle_key(&press(59)).unwrap();
        assert_eq!(f.remapper.current_layer, 2);
        assert_eq!(f.remapper.toggle_keys.len(), 2);
        // releasing the first toggle key pops both layers
        f.remapper.handle_key(&release(58)).unwrap();
        assert_eq!(f.remapper.current_layer, 0);
        assert!(f.remapper.toggle_keys.is_empty());
        assert!(f.remapper.previous_layers.is_empty());
    }

    #[test]
    fn momentary_stack_matches_held_toggle_keys() {
        let yaml = r#"
layers:
  - name: L0
    bindings:
      capslock: "toggle-layer L1"
  - name: L1
    bindings:
      f1: "toggle-layer L2"
  - name: L2
    bindings: {}
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(58)).unwrap();
        assert_eq!(f.remapper.toggle_keys.len(), 1);
        f.remapper.handle_key(&press(59)).unwrap();
        assert_eq!(f.remapper.toggle_keys.len(), 2);
        f.remapper.handle_key(&release(59)).unwrap();
        assert_eq!(f.remapper.toggle_keys.len(), 1);
        f.remapper.handle_key(&release(58)).unwrap();
        assert!(f.remapper.toggle_keys.is_empty());
    }

    #[test]
    fn escape_returns_to_initial_layer() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      tab: "layer other"
  - name: other
    passThrough: false
    bindings: {}
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(15)).unwrap();
        assert_eq!(f.remapper.current_layer, 1);
        f.remapper.handle_key(&press(1)).unwrap();
        assert_eq!(f.remapper.current_layer, 0);
        // escape was not forwarded, the layer switch consumed it
        assert!(f.keys.0.borrow().is_empty());
    }

    #[test]
    fn escape_bails_out_even_on_passthrough_layers() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      tab: "layer other"
  - name: other
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(15)).unwrap();
        assert_eq!(f.remapper.current_layer, 1);
        f.remapper.handle_key(&press(1)).unwrap();
        assert_eq!(f.remapper.current_layer, 0);
        assert!(f.keys.0.borrow().is_empty());
    }

    #[test]
    fn escape_on_initial_layer_passes_through() {
        let mut f = fixture("layers:\n  - name: initial\n");
        f.remapper.handle_key(&press(1)).unwrap();
        assert_eq!(*f.keys.0.borrow(), vec![(1, true)]);
    }

    #[test]
    fn layer_switch_drops_momentary_stack() {
        let yaml = r#"
layers:
  - name: L0
    bindings:
      capslock: "toggle-layer L1"
  - name: L1
    bindings:
      g: "layer L2"
  - name: L2
    bindings: {}
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(58)).unwrap();
        f.remapper.handle_key(&press(34)).unwrap();
        assert_eq!(f.remapper.current_layer, 2);
        assert!(f.remapper.toggle_keys.is_empty());
        // the old toggle key's release no longer pops anything
        f.remapper.handle_key(&release(58)).unwrap();
        assert_eq!(f.remapper.current_layer, 2);
    }

    #[test]
    fn unknown_layer_names_are_ignored() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      a: "layer missing"
      s: "toggle-layer missing"
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(30)).unwrap();
        f.remapper.handle_key(&press(31)).unwrap();
        assert_eq!(f.remapper.current_layer, 0);
        assert!(f.remapper.toggle_keys.is_empty());
    }

    #[test]
    fn multi_executes_in_order() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      a: "layer other ; b"
  - name: other
    bindings: {}
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(30)).unwrap();
        assert_eq!(f.remapper.current_layer, 1);
        assert_eq!(*f.keys.0.borrow(), vec![(48, true)]);
    }

    #[test]
    fn button_binding_follows_physical_key() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      space: "button left"
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(57)).unwrap();
        f.remapper.handle_key(&release(57)).unwrap();
        assert_eq!(
            *f.pointer.0.borrow(),
            vec![
                PointerEvent::Button(0x110, true),
                PointerEvent::Button(0x110, false)
            ]
        );
    }

    #[test]
    fn nothing_held_after_everything_released() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      a: "leftctrl+c"
      space: "button left"
"#;
        let mut f = fixture(yaml);
        for code in [30, 57, 48] {
            f.remapper.handle_key(&press(code)).unwrap();
        }
        for code in [48, 30, 57] {
            f.remapper.handle_key(&release(code)).unwrap();
        }
        assert!(!f.remapper.keyboard.any_held());
        assert!(!f.remapper.mouse.any_button_held());
    }

    #[test]
    fn idle_mouse_tick_parks() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      l: "move 1 0"
"#;
        let mut f = fixture(yaml);
        assert!(!f.remapper.tick_mouse().unwrap());
        assert!(f.pointer.0.borrow().is_empty());
    }

    #[test]
    fn held_move_binding_drives_the_mouse() {
        let yaml = r#"
startMouseSpeed: 500.0
baseMouseSpeed: 500.0
layers:
  - name: initial
    bindings:
      l: "move 1 0"
"#;
        let mut f = fixture(yaml);
        f.pressed.lock().insert(38); // l
        assert!(f.remapper.tick_mouse().unwrap());
        // 500 px/s at a 20ms tick, start speed == max: 10px per tick
        assert_eq!(*f.pointer.0.borrow(), vec![PointerEvent::Motion(10, 0)]);
        // release: the tick keeps running while velocity decays
        f.pressed.lock().remove(&38);
        let mut armed = 0;
        while f.remapper.tick_mouse().unwrap() {
            armed += 1;
            assert!(armed < 200, "deceleration never parked");
        }
        assert!(!f.remapper.mouse.is_moving());
    }

    #[test]
    fn speed_binding_scales_motion() {
        let yaml = r#"
startMouseSpeed: 500.0
baseMouseSpeed: 500.0
layers:
  - name: initial
    bindings:
      l: "move 1 0"
      f: "speed 2"
"#;
        let mut f = fixture(yaml);
        f.pressed.lock().insert(38);
        f.pressed.lock().insert(33);
        assert!(f.remapper.tick_mouse().unwrap());
        assert_eq!(*f.pointer.0.borrow(), vec![PointerEvent::Motion(20, 0)]);
    }

    #[test]
    fn scroll_binding_accumulates_wheel_ticks() {
        let yaml = r#"
baseScrollSpeed: 25.0
layers:
  - name: initial
    bindings:
      u: "scroll 0 -1"
"#;
        let mut f = fixture(yaml);
        f.pressed.lock().insert(22); // u
        f.remapper.tick_mouse().unwrap();
        f.remapper.tick_mouse().unwrap();
        // 25 ticks/s * 20ms = 0.5 per tick; the second tick flushes -1
        assert_eq!(*f.pointer.0.borrow(), vec![PointerEvent::Wheel(0, -1)]);
    }

    #[test]
    fn reload_failure_keeps_old_config_and_flushes_taphold() {
        let yaml = r#"
layers:
  - name: initial
    bindings:
      r: reload-config
      a: b
"#;
        let mut f = fixture(yaml);
        f.remapper.handle_key(&press(19)).unwrap();
        // the config path does not exist, so the old config stays
        assert_eq!(f.remapper.config.layers[0].name, "initial");
        assert!(matches!(
            f.control_rx.try_recv(),
            Ok(ControlMsg::FlushPending)
        ));
        f.remapper.handle_key(&release(19)).unwrap();
        f.remapper.handle_key(&press(30)).unwrap();
        assert_eq!(*f.keys.0.borrow(), vec![(48, true)]);
    }
}
