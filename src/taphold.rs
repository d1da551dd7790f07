//! Tap-hold disambiguation.
//!
//! Raw reader events pass through here before they reach the binding
//! interpreter. A press of a tap-hold key cannot be acted on immediately: it
//! is queued, together with everything that arrives after it, until one of
//! three things resolves it:
//!
//! - another key completes a full press-release cycle while it is held, which
//!   resolves it (and every tap-hold press queued before that cycle) as hold;
//! - its own release arrives before the timeout, which resolves it as tap;
//! - the timeout expires, which resolves it as hold.
//!
//! Queued tap-hold presses can nest; resolving the oldest one releases the
//! queue only up to the next press that is still undecided. Events that leave
//! the queue carry `hold_key` on the press and release of every key that
//! resolved as hold.
//!
//! [`TapHoldState`] is the synchronous state machine; [`TapHoldHandler`] runs
//! it on a thread that multiplexes the reader channel, a control channel and
//! the earliest pending deadline.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{never, select, Receiver, Sender};
use parking_lot::Mutex;

use crate::cfg::{Binding, Config};
use crate::keys::{KeyEvent, KeyValue};

/// Requests handled by the tap-hold thread besides key events.
pub enum ControlMsg {
    /// Resolve everything still queued as taps and forward it. Sent on config
    /// reload so no synthetic state is stranded on bindings that may be gone.
    FlushPending,
}

/// The interpreter's view of the active layer, shared with the tap-hold
/// thread so it can recognize tap-hold keys and their timeouts.
pub struct LayerView {
    pub config: Arc<Config>,
    pub layer: usize,
}

pub type SharedLayerView = Arc<Mutex<LayerView>>;

#[derive(Copy, Clone, Debug)]
enum QueuedKind {
    PassThrough,
    Pending { deadline: Instant },
    ResolvedTap { release: Option<KeyEvent> },
    ResolvedHold,
}

struct QueuedEvent {
    event: KeyEvent,
    kind: QueuedKind,
}

pub struct TapHoldState {
    queue: VecDeque<QueuedEvent>,
    // keys whose current press resolved as hold; their release mirrors the flag
    hold_faces: HashSet<u16>,
    // physical key state, shared with the mouse tick
    pressed: Arc<Mutex<HashSet<u16>>>,
}

impl TapHoldState {
    pub fn new(pressed: Arc<Mutex<HashSet<u16>>>) -> Self {
        Self {
            queue: VecDeque::new(),
            hold_faces: HashSet::new(),
            pressed,
        }
    }

    /// Feeds one raw event through the state machine. For a press of a
    /// tap-hold key, `tap_hold_timeout` carries its timeout in milliseconds.
    /// Returns every event that became emittable.
    pub fn handle_event(
        &mut self,
        event: KeyEvent,
        tap_hold_timeout: Option<u64>,
    ) -> Vec<KeyEvent> {
        match event.value {
            KeyValue::Press => self.pressed.lock().insert(event.code),
            KeyValue::Release => self.pressed.lock().remove(&event.code),
        };
        self.mark_expired(event.time);

        match event.value {
            KeyValue::Press => {
                if let Some(timeout) = tap_hold_timeout {
                    let deadline = event.time + Duration::from_millis(timeout);
                    self.queue.push_back(QueuedEvent {
                        event,
                        kind: QueuedKind::Pending { deadline },
                    });
                } else if self.queue.is_empty() {
                    return vec![event];
                } else {
                    self.queue.push_back(QueuedEvent {
                        event,
                        kind: QueuedKind::PassThrough,
                    });
                }
            }
            KeyValue::Release => match self.matching_press(event.code) {
                None => {
                    // pressed before buffering started, no cycle completes
                    if self.queue.is_empty() {
                        return vec![self.finish_release(event)];
                    }
                    self.queue.push_back(QueuedEvent {
                        event,
                        kind: QueuedKind::PassThrough,
                    });
                }
                Some(i) => {
                    // this key went through a full press-release cycle while
                    // every older queued tap-hold key was held down
                    self.resolve_holds_before(i);
                    if matches!(self.queue[i].kind, QueuedKind::Pending { .. }) {
                        self.queue[i].kind = QueuedKind::ResolvedTap {
                            release: Some(event),
                        };
                    } else {
                        self.queue.push_back(QueuedEvent {
                            event,
                            kind: QueuedKind::PassThrough,
                        });
                    }
                }
            },
        }
        self.drain()
    }

    /// Resolves every pending key whose deadline has passed and returns the
    /// events that became emittable.
    pub fn handle_timeout(&mut self, now: Instant) -> Vec<KeyEvent> {
        self.mark_expired(now);
        self.drain()
    }

    /// The earliest deadline among still-pending tap-hold presses.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue
            .iter()
            .filter_map(|q| match q.kind {
                QueuedKind::Pending { deadline } => Some(deadline),
                _ => None,
            })
            .min()
    }

    /// Resolves everything still queued as taps and returns the whole queue.
    pub fn flush_pending(&mut self) -> Vec<KeyEvent> {
        for entry in &mut self.queue {
            if matches!(entry.kind, QueuedKind::Pending { .. }) {
                entry.kind = QueuedKind::ResolvedTap { release: None };
            }
        }
        self.drain()
    }

    /// Physical (not disambiguated) key state, for the mouse tick.
    pub fn pressed_handle(&self) -> Arc<Mutex<HashSet<u16>>> {
        self.pressed.clone()
    }

    fn mark_expired(&mut self, now: Instant) {
        for entry in &mut self.queue {
            if matches!(entry.kind, QueuedKind::Pending { deadline } if deadline <= now) {
                entry.kind = QueuedKind::ResolvedHold;
            }
        }
    }

    fn resolve_holds_before(&mut self, i: usize) {
        for entry in self.queue.iter_mut().take(i) {
            if matches!(entry.kind, QueuedKind::Pending { .. }) {
                entry.kind = QueuedKind::ResolvedHold;
            }
        }
    }

    /// Index of the queued press this release belongs to. Tap-resolved
    /// presses already contain their release and are skipped.
    fn matching_press(&self, code: u16) -> Option<usize> {
        let prior_releases = self
            .queue
            .iter()
            .filter(|q| q.event.code == code && q.event.value == KeyValue::Release)
            .count();
        self.queue
            .iter()
            .enumerate()
            .filter(|(_, q)| {
                q.event.code == code
                    && q.event.value == KeyValue::Press
                    && !matches!(q.kind, QueuedKind::ResolvedTap { .. })
            })
            .nth(prior_releases)
            .map(|(i, _)| i)
    }

    /// Emits everything at the front of the queue up to the next press that
    /// is still undecided.
    fn drain(&mut self) -> Vec<KeyEvent> {
        let mut out = Vec::new();
        loop {
            let kind = match self.queue.front() {
                Some(entry) => entry.kind,
                None => break,
            };
            if matches!(kind, QueuedKind::Pending { .. }) {
                break;
            }
            let entry = self.queue.pop_front().unwrap();
            match entry.kind {
                QueuedKind::ResolvedHold => {
                    let mut ev = entry.event;
                    ev.hold_key = true;
                    self.hold_faces.insert(ev.code);
                    out.push(ev);
                }
                QueuedKind::ResolvedTap { release } => {
                    out.push(entry.event);
                    if let Some(rel) = release {
                        out.push(rel);
                    }
                }
                QueuedKind::PassThrough => out.push(match entry.event.value {
                    KeyValue::Release => self.finish_release(entry.event),
                    KeyValue::Press => entry.event,
                }),
                QueuedKind::Pending { .. } => unreachable!(),
            }
        }
        out
    }

    fn finish_release(&mut self, mut event: KeyEvent) -> KeyEvent {
        if self.hold_faces.remove(&event.code) {
            event.hold_key = true;
        }
        event
    }
}

// ------------------ worker thread --------------------

pub struct TapHoldHandler {
    /// Disambiguated events, consumed by the interpreter.
    pub events: Receiver<KeyEvent>,
    /// Control requests into the tap-hold thread.
    pub control: Sender<ControlMsg>,
    /// Physical key state, readable by the mouse tick.
    pub pressed: Arc<Mutex<HashSet<u16>>>,
}

impl TapHoldHandler {
    pub fn spawn(raw_events: Receiver<KeyEvent>, view: SharedLayerView) -> Self {
        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        let (ctl_tx, ctl_rx) = crossbeam_channel::unbounded();
        let state = TapHoldState::new(Arc::new(Mutex::new(HashSet::new())));
        let pressed = state.pressed_handle();
        thread::spawn(move || {
            process_loop(raw_events, ctl_rx, out_tx, view, state);
        });
        TapHoldHandler {
            events: out_rx,
            control: ctl_tx,
            pressed,
        }
    }
}

fn process_loop(
    raw_events: Receiver<KeyEvent>,
    control: Receiver<ControlMsg>,
    out: Sender<KeyEvent>,
    view: SharedLayerView,
    mut state: TapHoldState,
) {
    loop {
        let timer = match state.next_deadline() {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => never(),
        };
        let resolved = select! {
            recv(raw_events) -> event => match event {
                Ok(event) => {
                    let timeout = if event.is_press() {
                        tap_hold_timeout(&view, event.code)
                    } else {
                        None
                    };
                    state.handle_event(event, timeout)
                }
                Err(_) => return,
            },
            recv(control) -> msg => match msg {
                Ok(ControlMsg::FlushPending) => state.flush_pending(),
                Err(_) => return,
            },
            recv(timer) -> _ => state.handle_timeout(Instant::now()),
        };
        for event in resolved {
            if out.send(event).is_err() {
                return;
            }
        }
    }
}

/// Timeout of the tap-hold binding for `code` on the active layer, if any.
/// The per-binding timeout falls back to the global quick-tap time.
fn tap_hold_timeout(view: &SharedLayerView, code: u16) -> Option<u64> {
    let view = view.lock();
    let layer = view.config.layers.get(view.layer)?;
    let binding = layer.bindings.get(&code).or(layer.wildcard.as_ref())?;
    match binding {
        Binding::TapHold { timeout_ms, .. } => {
            Some(timeout_ms.unwrap_or(view.config.quick_tap_time))
        }
        _ => None,
    }
}
