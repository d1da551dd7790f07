//! Configuration loading.
//!
//! The config file is YAML. Scalar settings deserialize straight into
//! [`RawConfig`]; binding values are strings in a small `;`-separated grammar
//! that is parsed here into [`Binding`] values:
//!
//! ```yaml
//! layers:
//!   - name: initial
//!     bindings:
//!       capslock: "tap-hold 200 ; esc ; toggle-layer mouse"
//!       j: down
//!       m: "button left"
//!       u: "scroll 0 -1"
//!       x: "leftctrl+x"
//! ```
//!
//! Layers are referenced by name inside bindings but stored in a `Vec` and
//! addressed by index everywhere else, which keeps the binding tree free of
//! layer back-references.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::keys;

#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Emit a chord of key codes, held until the physical key is released.
    Key { combo: Vec<u16> },
    /// Hold a mouse button until the physical key is released.
    Button(u16),
    /// Contributes to pointer velocity while the key is held.
    Move { x: f64, y: f64 },
    /// Contributes to scroll velocity while the key is held.
    Scroll { x: f64, y: f64 },
    /// Multiplies pointer/scroll speed while the key is held.
    Speed(f64),
    /// Switch the base layer and drop the momentary layer stack.
    Layer(String),
    /// Push a momentary layer for as long as the key is held.
    ToggleLayer(String),
    /// Resolved by the tap-hold handler into one of the two faces.
    TapHold {
        tap: Box<Binding>,
        hold: Box<Binding>,
        timeout_ms: Option<u64>,
    },
    /// Execute each binding in order.
    Multi(Vec<Binding>),
    /// Re-read the configuration file.
    ReloadConfig,
    /// Spawn a shell command.
    Exec(String),
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub bindings: BTreeMap<u16, Binding>,
    pub wildcard: Option<Binding>,
    pub pass_through: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub devices: Vec<String>,
    pub start_command: Option<String>,
    pub quick_tap_time: u64,
    pub base_mouse_speed: f64,
    pub start_mouse_speed: f64,
    pub base_scroll_speed: f64,
    pub mouse_acceleration_time: f64,
    pub mouse_deceleration_time: f64,
    pub mouse_acceleration_curve: f64,
    pub mouse_deceleration_curve: f64,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    devices: Vec<String>,
    #[serde(default)]
    start_command: Option<String>,
    #[serde(default = "default_quick_tap_time")]
    quick_tap_time: u64,
    #[serde(default = "default_base_mouse_speed")]
    base_mouse_speed: f64,
    #[serde(default = "default_start_mouse_speed")]
    start_mouse_speed: f64,
    #[serde(default = "default_base_scroll_speed")]
    base_scroll_speed: f64,
    #[serde(default = "default_mouse_acceleration_time")]
    mouse_acceleration_time: f64,
    #[serde(default = "default_mouse_deceleration_time")]
    mouse_deceleration_time: f64,
    #[serde(default = "default_mouse_acceleration_curve")]
    mouse_acceleration_curve: f64,
    #[serde(default = "default_mouse_deceleration_curve")]
    mouse_deceleration_curve: f64,
    layers: Vec<RawLayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawLayer {
    name: String,
    #[serde(default = "default_true")]
    pass_through: bool,
    #[serde(default)]
    bindings: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}
fn default_quick_tap_time() -> u64 {
    150
}
fn default_base_mouse_speed() -> f64 {
    750.0
}
fn default_start_mouse_speed() -> f64 {
    150.0
}
fn default_base_scroll_speed() -> f64 {
    20.0
}
fn default_mouse_acceleration_time() -> f64 {
    200.0
}
fn default_mouse_deceleration_time() -> f64 {
    300.0
}
fn default_mouse_acceleration_curve() -> f64 {
    2.0
}
fn default_mouse_deceleration_curve() -> f64 {
    3.0
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("could not parse {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Config> {
        let raw: RawConfig = serde_yaml::from_str(text)?;

        if raw.layers.is_empty() {
            bail!("at least one layer must be defined");
        }
        if raw.mouse_acceleration_time <= 0.0 || raw.mouse_deceleration_time <= 0.0 {
            bail!("mouseAccelerationTime and mouseDecelerationTime must be positive");
        }

        let mut layers = Vec::with_capacity(raw.layers.len());
        let mut seen = BTreeSet::new();
        for raw_layer in raw.layers {
            if !seen.insert(raw_layer.name.clone()) {
                bail!("duplicate layer name: {}", raw_layer.name);
            }
            layers.push(
                parse_layer(&raw_layer)
                    .with_context(|| format!("in layer {}", raw_layer.name))?,
            );
        }

        Ok(Config {
            devices: raw.devices,
            start_command: raw.start_command,
            quick_tap_time: raw.quick_tap_time,
            base_mouse_speed: raw.base_mouse_speed,
            start_mouse_speed: raw.start_mouse_speed,
            base_scroll_speed: raw.base_scroll_speed,
            mouse_acceleration_time: raw.mouse_acceleration_time,
            mouse_deceleration_time: raw.mouse_deceleration_time,
            mouse_acceleration_curve: raw.mouse_acceleration_curve,
            mouse_deceleration_curve: raw.mouse_deceleration_curve,
            layers,
        })
    }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    /// All key codes that bindings can emit, for advertising on the virtual
    /// keyboard. The wildcard sentinel is excluded; wildcards resolve to the
    /// physical code of the key that triggered them.
    pub fn referenced_key_codes(&self) -> BTreeSet<u16> {
        fn collect(binding: &Binding, out: &mut BTreeSet<u16>) {
            match binding {
                Binding::Key { combo } => {
                    out.extend(combo.iter().copied().filter(|&c| c != keys::WILDCARD_KEY))
                }
                Binding::TapHold { tap, hold, .. } => {
                    collect(tap, out);
                    collect(hold, out);
                }
                Binding::Multi(bindings) => {
                    for b in bindings {
                        collect(b, out);
                    }
                }
                _ => {}
            }
        }
        let mut out = BTreeSet::new();
        for layer in &self.layers {
            for binding in layer.bindings.values().chain(layer.wildcard.iter()) {
                collect(binding, &mut out);
            }
        }
        out
    }
}

fn parse_layer(raw: &RawLayer) -> Result<Layer> {
    let mut bindings = BTreeMap::new();
    let mut wildcard = None;
    for (key_name, value) in &raw.bindings {
        let binding = parse_binding(value)
            .with_context(|| format!("binding for key {key_name}"))?;
        if key_name == "*" {
            wildcard = Some(binding);
        } else {
            let code = keys::key_code(key_name)
                .ok_or_else(|| anyhow!("unknown key alias: {key_name}"))?;
            bindings.insert(code, binding);
        }
    }
    Ok(Layer {
        name: raw.name.clone(),
        bindings,
        wildcard,
        pass_through: raw.pass_through,
    })
}

/// Parses a binding string. The string is split on `;`; a leading `tap-hold`
/// keyword consumes the next part as the tap binding and the remaining parts
/// as the hold binding, otherwise multiple parts form a `Multi`.
pub fn parse_binding(s: &str) -> Result<Binding> {
    let parts: Vec<&str> = s.split(';').map(str::trim).collect();
    let head: Vec<&str> = parts[0].split_whitespace().collect();

    if head.first() == Some(&"tap-hold") {
        let timeout_ms = match head.len() {
            1 => None,
            2 => Some(
                head[1]
                    .parse::<u64>()
                    .with_context(|| format!("invalid tap-hold timeout: {}", head[1]))?,
            ),
            _ => bail!("tap-hold takes at most one timeout argument"),
        };
        if parts.len() < 3 {
            bail!("tap-hold needs a tap part and a hold part: {s}");
        }
        let tap = parse_binding(parts[1])?;
        let hold = parse_binding(&parts[2..].join(" ; "))?;
        return Ok(Binding::TapHold {
            tap: Box::new(tap),
            hold: Box::new(hold),
            timeout_ms,
        });
    }

    if parts.len() > 1 {
        let bindings = parts
            .iter()
            .map(|p| parse_single(p))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Binding::Multi(bindings));
    }

    parse_single(parts[0])
}

fn parse_single(s: &str) -> Result<Binding> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    match tokens.as_slice() {
        [] => bail!("empty binding"),
        ["layer", name] => Ok(Binding::Layer((*name).to_string())),
        ["toggle-layer", name] => Ok(Binding::ToggleLayer((*name).to_string())),
        ["button", name] => keys::button_code(name)
            .map(Binding::Button)
            .ok_or_else(|| anyhow!("unknown mouse button: {name}")),
        ["move", x, y] => Ok(Binding::Move {
            x: parse_float(x)?,
            y: parse_float(y)?,
        }),
        ["scroll", x, y] => Ok(Binding::Scroll {
            x: parse_float(x)?,
            y: parse_float(y)?,
        }),
        ["speed", factor] => Ok(Binding::Speed(parse_float(factor)?)),
        ["reload-config"] => Ok(Binding::ReloadConfig),
        ["exec", ..] => {
            let command = s.trim().strip_prefix("exec").unwrap().trim();
            if command.is_empty() {
                bail!("exec needs a command");
            }
            Ok(Binding::Exec(command.to_string()))
        }
        [combo] => parse_combo(combo),
        _ => bail!("unrecognized binding: {s}"),
    }
}

fn parse_combo(s: &str) -> Result<Binding> {
    let combo = s
        .split('+')
        .map(|name| {
            keys::key_code(name.trim()).ok_or_else(|| anyhow!("unknown key alias: {name}"))
        })
        .collect::<Result<Vec<u16>>>()?;
    Ok(Binding::Key { combo })
}

fn parse_float(s: &str) -> Result<f64> {
    s.parse::<f64>()
        .map_err(|_| anyhow!("invalid number: {s}"))
}
