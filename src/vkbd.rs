//! Virtual keyboard: owner-keyed tracking of synthetic key state.
//!
//! Every chord emitted on behalf of a physical key is recorded under that
//! key's code, so that the release of the physical key can mirror-release
//! exactly the synthetic keys it owns. A code held through several owners is
//! only released when the last owner lets go.

use std::collections::HashMap;
use std::io;

/// Sink for synthetic key events. Implemented by the uinput device in
/// production and by a recorder in tests.
pub trait KeySink {
    fn press(&mut self, code: u16) -> io::Result<()>;
    fn release(&mut self, code: u16) -> io::Result<()>;
}

pub struct VirtualKeyboard<S> {
    sink: S,
    // physical owner code -> synthetic codes held on its behalf
    held: HashMap<u16, Vec<u16>>,
}

impl<S: KeySink> VirtualKeyboard<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            held: HashMap::new(),
        }
    }

    /// Emits the chord `combo` and records `owner` as holding it. Codes are
    /// pressed in combo order, so modifiers come first and the final code
    /// completes the chord. A second call for the same owner replaces the
    /// recorded combo.
    pub fn press_keys(&mut self, owner: u16, combo: &[u16]) -> io::Result<()> {
        log::debug!("pressing keys: {combo:?}");
        let already = self.held.get(&owner).cloned().unwrap_or_default();
        for &code in combo {
            if !already.contains(&code) {
                self.sink.press(code)?;
            }
        }
        self.held.insert(owner, combo.to_vec());
        Ok(())
    }

    /// Reports that the physical key `owner` was released. Its combo is
    /// released in reverse order; codes still held via another owner stay
    /// down.
    pub fn original_key_up(&mut self, owner: u16) -> io::Result<()> {
        if let Some(combo) = self.held.remove(&owner) {
            for &code in combo.iter().rev() {
                let held_elsewhere = self.held.values().any(|c| c.contains(&code));
                if !held_elsewhere {
                    self.sink.release(code)?;
                }
            }
        }
        Ok(())
    }

    /// True while any synthetic key is down.
    pub fn any_held(&self) -> bool {
        !self.held.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod recorder {
    use super::KeySink;
    use std::io;

    /// Records emitted events as (code, pressed) pairs.
    #[derive(Default)]
    pub struct Recorder(pub Vec<(u16, bool)>);

    impl KeySink for &mut Recorder {
        fn press(&mut self, code: u16) -> io::Result<()> {
            self.0.push((code, true));
            Ok(())
        }
        fn release(&mut self, code: u16) -> io::Result<()> {
            self.0.push((code, false));
            Ok(())
        }
    }
}
