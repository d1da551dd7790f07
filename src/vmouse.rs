//! Virtual mouse: pointer motion, scroll and button state.
//!
//! Motion is integrated on a fixed tick. The engine keeps a ramp progress in
//! [0, 1]; the emitted speed is `max_speed * progress^curve`, with separate
//! curves for ramping up and coasting down. Sub-pixel remainders carry over
//! between ticks so slow diagonal motion stays smooth, and scroll accumulates
//! fractional wheel ticks the same way.

use std::collections::HashMap;
use std::io;

/// Sink for synthetic pointer events. Coordinates are screen-style: x grows
/// to the right, y grows downward.
pub trait PointerSink {
    fn motion(&mut self, dx: i32, dy: i32) -> io::Result<()>;
    fn wheel(&mut self, x: i32, y: i32) -> io::Result<()>;
    fn press_button(&mut self, button: u16) -> io::Result<()>;
    fn release_button(&mut self, button: u16) -> io::Result<()>;
}

pub struct VirtualMouse<S> {
    sink: S,
    // physical owner code -> held button
    buttons: HashMap<u16, u16>,
    progress: f64,
    dir_x: f64,
    dir_y: f64,
    residual_x: f64,
    residual_y: f64,
    scroll_x: f64,
    scroll_y: f64,
}

impl<S: PointerSink> VirtualMouse<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            buttons: HashMap::new(),
            progress: 0.0,
            dir_x: 0.0,
            dir_y: 0.0,
            residual_x: 0.0,
            residual_y: 0.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    /// Advances the motion ramp by one tick and emits the resulting delta.
    ///
    /// `dx`/`dy` is the desired input for this tick (already scaled by the
    /// base speed and tick length); a zero input decelerates along the last
    /// direction until the ramp reaches zero. When motion starts from rest
    /// the ramp is seeded so that the first tick moves at `start_speed`.
    #[allow(clippy::too_many_arguments)]
    pub fn mouse_move(
        &mut self,
        dx: f64,
        dy: f64,
        start_speed: f64,
        max_speed: f64,
        accel_curve: f64,
        accel_step: f64,
        decel_curve: f64,
        decel_step: f64,
        speed_factor: f64,
    ) -> io::Result<()> {
        let magnitude = (dx * dx + dy * dy).sqrt();
        let speed;
        if magnitude > 0.0 {
            self.dir_x = dx / magnitude;
            self.dir_y = dy / magnitude;
            if self.progress <= 0.0 {
                self.progress = seeded_progress(start_speed, max_speed, accel_curve);
            } else {
                self.progress = (self.progress + accel_step).min(1.0);
            }
            speed = max_speed * self.progress.powf(accel_curve);
        } else if self.progress > 0.0 {
            self.progress = (self.progress - decel_step).max(0.0);
            speed = max_speed * self.progress.powf(decel_curve);
        } else {
            return Ok(());
        }

        let want_x = self.dir_x * speed * speed_factor + self.residual_x;
        let want_y = self.dir_y * speed * speed_factor + self.residual_y;
        let whole_x = want_x.trunc();
        let whole_y = want_y.trunc();
        self.residual_x = want_x - whole_x;
        self.residual_y = want_y - whole_y;
        if whole_x != 0.0 || whole_y != 0.0 {
            self.sink.motion(whole_x as i32, whole_y as i32)?;
        }
        Ok(())
    }

    /// Accumulates fractional scroll and flushes whole wheel ticks.
    pub fn scroll(&mut self, dx: f64, dy: f64) -> io::Result<()> {
        self.scroll_x += dx;
        self.scroll_y += dy;
        let whole_x = self.scroll_x.trunc();
        let whole_y = self.scroll_y.trunc();
        if whole_x != 0.0 || whole_y != 0.0 {
            self.scroll_x -= whole_x;
            self.scroll_y -= whole_y;
            self.sink.wheel(whole_x as i32, whole_y as i32)?;
        }
        Ok(())
    }

    /// Holds `button` down on behalf of the physical key `owner`.
    pub fn button_press(&mut self, owner: u16, button: u16) -> io::Result<()> {
        log::debug!("pressing button: {button}");
        let held_elsewhere = self.buttons.values().any(|&b| b == button);
        self.buttons.insert(owner, button);
        if !held_elsewhere {
            self.sink.press_button(button)?;
        }
        Ok(())
    }

    /// Reports that the physical key `owner` was released; its button goes up
    /// unless another owner still holds it.
    pub fn original_key_up(&mut self, owner: u16) -> io::Result<()> {
        if let Some(button) = self.buttons.remove(&owner) {
            let held_elsewhere = self.buttons.values().any(|&b| b == button);
            if !held_elsewhere {
                self.sink.release_button(button)?;
            }
        }
        Ok(())
    }

    /// True while residual velocity remains, so the tick loop keeps running
    /// through the deceleration tail.
    pub fn is_moving(&self) -> bool {
        self.progress > 0.0
    }

    pub fn any_button_held(&self) -> bool {
        !self.buttons.is_empty()
    }
}

/// Ramp progress at which speed equals `start_speed`.
fn seeded_progress(start_speed: f64, max_speed: f64, curve: f64) -> f64 {
    if max_speed <= 0.0 {
        return 0.0;
    }
    let ratio = (start_speed / max_speed).clamp(0.0, 1.0);
    if curve <= 0.0 {
        return 1.0;
    }
    ratio.powf(1.0 / curve)
}

#[cfg(test)]
pub(crate) mod recorder {
    use super::PointerSink;
    use std::io;

    #[derive(Debug, PartialEq, Eq)]
    pub enum Emitted {
        Motion(i32, i32),
        Wheel(i32, i32),
        Button(u16, bool),
    }

    #[derive(Default)]
    pub struct Recorder(pub Vec<Emitted>);

    impl PointerSink for &mut Recorder {
        fn motion(&mut self, dx: i32, dy: i32) -> io::Result<()> {
            self.0.push(Emitted::Motion(dx, dy));
            Ok(())
        }
        fn wheel(&mut self, x: i32, y: i32) -> io::Result<()> {
            self.0.push(Emitted::Wheel(x, y));
            Ok(())
        }
        fn press_button(&mut self, button: u16) -> io::Result<()> {
            self.0.push(Emitted::Button(button, true));
            Ok(())
        }
        fn release_button(&mut self, button: u16) -> io::Result<()> {
            self.0.push(Emitted::Button(button, false));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recorder::{Emitted, Recorder};
    use super::*;

    // one tick at full speed moves 10px, starting speed 4px
    fn tick(mouse: &mut VirtualMouse<&mut Recorder>, dx: f64, dy: f64) {
        mouse
            .mouse_move(dx, dy, 4.0, 10.0, 2.0, 0.25, 2.0, 0.25, 1.0)
            .unwrap();
    }

    #[test]
    fn first_tick_moves_at_start_speed() {
        let mut rec = Recorder::default();
        let mut mouse = VirtualMouse::new(&mut rec);
        tick(&mut mouse, 10.0, 0.0);
        drop(mouse);
        assert_eq!(rec.0, vec![Emitted::Motion(4, 0)]);
    }

    #[test]
    fn ramps_to_max_speed() {
        let mut rec = Recorder::default();
        let mut mouse = VirtualMouse::new(&mut rec);
        for _ in 0..10 {
            tick(&mut mouse, 10.0, 0.0);
        }
        assert!(mouse.is_moving());
        drop(mouse);
        // progress saturates at 1.0, so the last ticks move at max speed
        assert_eq!(*rec.0.last().unwrap(), Emitted::Motion(10, 0));
    }

    #[test]
    fn decelerates_to_rest_along_last_direction() {
        let mut rec = Recorder::default();
        let mut mouse = VirtualMouse::new(&mut rec);
        for _ in 0..10 {
            tick(&mut mouse, 10.0, 0.0);
        }
        mouse.sink.0.clear();
        let mut coast_ticks = 0;
        while mouse.is_moving() {
            tick(&mut mouse, 0.0, 0.0);
            coast_ticks += 1;
            assert!(coast_ticks < 100, "deceleration never parked");
        }
        // once parked, further idle ticks emit nothing
        tick(&mut mouse, 0.0, 0.0);
        drop(mouse);
        assert_eq!(coast_ticks, 4); // 1.0 / decel_step
        assert!(rec
            .0
            .iter()
            .all(|e| matches!(e, Emitted::Motion(dx, 0) if *dx >= 0)));
    }

    #[test]
    fn subpixel_residuals_accumulate() {
        let mut rec = Recorder::default();
        let mut mouse = VirtualMouse::new(&mut rec);
        // start speed 0.4px per tick: no motion for two ticks, then 1px
        for _ in 0..3 {
            mouse
                .mouse_move(10.0, 0.0, 0.4, 10.0, 1.0, 0.0, 1.0, 0.0, 1.0)
                .unwrap();
        }
        drop(mouse);
        assert_eq!(rec.0, vec![Emitted::Motion(1, 0)]);
    }

    #[test]
    fn speed_factor_scales_emitted_delta() {
        let mut rec = Recorder::default();
        let mut mouse = VirtualMouse::new(&mut rec);
        mouse
            .mouse_move(10.0, 0.0, 4.0, 10.0, 2.0, 0.25, 2.0, 0.25, 2.0)
            .unwrap();
        drop(mouse);
        assert_eq!(rec.0, vec![Emitted::Motion(8, 0)]);
    }

    #[test]
    fn diagonal_direction_is_normalized() {
        let mut rec = Recorder::default();
        let mut mouse = VirtualMouse::new(&mut rec);
        // seeded progress 1.0: start == max, so one tick moves at 10px
        mouse
            .mouse_move(10.0, 10.0, 10.0, 10.0, 2.0, 0.25, 2.0, 0.25, 1.0)
            .unwrap();
        drop(mouse);
        // 10 / sqrt(2) ~= 7.07 on both axes
        assert_eq!(rec.0, vec![Emitted::Motion(7, 7)]);
    }

    #[test]
    fn scroll_flushes_whole_ticks_only() {
        let mut rec = Recorder::default();
        let mut mouse = VirtualMouse::new(&mut rec);
        for _ in 0..4 {
            mouse.scroll(0.0, 0.4).unwrap();
        }
        drop(mouse);
        assert_eq!(rec.0, vec![Emitted::Wheel(0, 1)]);
    }

    #[test]
    fn scroll_negative_axis() {
        let mut rec = Recorder::default();
        let mut mouse = VirtualMouse::new(&mut rec);
        mouse.scroll(-0.6, 0.0).unwrap();
        mouse.scroll(-0.6, 0.0).unwrap();
        drop(mouse);
        assert_eq!(rec.0, vec![Emitted::Wheel(-1, 0)]);
    }

    #[test]
    fn buttons_follow_owners() {
        let mut rec = Recorder::default();
        let mut mouse = VirtualMouse::new(&mut rec);
        mouse.button_press(100, 0x110).unwrap();
        mouse.button_press(101, 0x110).unwrap();
        mouse.original_key_up(100).unwrap();
        assert!(mouse.any_button_held());
        mouse.original_key_up(101).unwrap();
        assert!(!mouse.any_button_held());
        drop(mouse);
        assert_eq!(
            rec.0,
            vec![Emitted::Button(0x110, true), Emitted::Button(0x110, false)]
        );
    }

    #[test]
    fn idle_mouse_reports_not_moving() {
        let mut rec = Recorder::default();
        let mouse = VirtualMouse::new(&mut rec);
        assert!(!mouse.is_moving());
    }
}
