//! Mount lifecycle: phases, the still-mounted flag, resize debouncing and
//! the ordered teardown.

use std::cell::Cell;
use std::rc::Rc;

use crate::engine::{ParticleEngine, RenderBackend};

/// `Uninitialized -> Loading -> Ready | ReadyEmpty -> Disposed`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    /// Source fetch in flight.
    Loading,
    /// Scene built and animating.
    Ready,
    /// Load failed; animates an empty surface.
    ReadyEmpty,
    Disposed,
}

impl Phase {
    pub fn is_ready(self) -> bool {
        matches!(self, Phase::Ready | Phase::ReadyEmpty)
    }
}

/// Shared "still mounted" bit.
///
/// The async load holds a [`LoadTicket`] cloned from it and must check it
/// before touching render state; teardown clears it first.
#[derive(Clone, Debug)]
pub struct MountFlag(Rc<Cell<bool>>);

impl MountFlag {
    pub fn new() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub fn is_mounted(&self) -> bool {
        self.0.get()
    }

    pub fn unmount(&self) {
        self.0.set(false);
    }

    pub fn ticket(&self) -> LoadTicket {
        LoadTicket(self.clone())
    }
}

impl Default for MountFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Handed to the load task; outlives the mount safely.
#[derive(Clone, Debug)]
pub struct LoadTicket(MountFlag);

impl LoadTicket {
    pub fn is_live(&self) -> bool {
        self.0.is_mounted()
    }
}

/// Keeps only the latest value and releases it once `delay_ms` has passed
/// without a newer one.
#[derive(Clone, Debug)]
pub struct Debouncer<T> {
    delay_ms: f64,
    pending: Option<(f64, T)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: f64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub fn schedule(&mut self, now_ms: f64, value: T) {
        self.pending = Some((now_ms + self.delay_ms, value));
    }

    pub fn poll(&mut self, now_ms: f64) -> Option<T> {
        let due = matches!(self.pending, Some((deadline, _)) if now_ms >= deadline);
        if due {
            self.pending.take().map(|(_, v)| v)
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Converts frame timestamps (ms) into elapsed seconds.
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the previous tick; zero on the first one or if the
    /// timestamp went backwards.
    pub fn tick(&mut self, now_ms: f64) -> f32 {
        let delta = match self.last_ms {
            Some(last) => ((now_ms - last) / 1000.0).max(0.0),
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        delta as f32
    }
}

/// What the host page owns on the engine's behalf.
pub trait HostSurface {
    fn cancel_frame(&mut self);
    fn remove_listeners(&mut self);
    /// Remove the canvas from its container.
    fn detach_surface(&mut self);
}

/// Tear a mount down in the only valid order: stop late loads, cancel the
/// frame, drop listeners, detach the surface, then free GPU handles.
pub fn teardown<H, B>(host: &mut H, engine: &mut ParticleEngine<B>)
where
    H: HostSurface,
    B: RenderBackend,
{
    if engine.phase() == Phase::Disposed {
        return;
    }
    engine.unmount();
    host.cancel_frame();
    host.remove_listeners();
    host.detach_surface();
    engine.dispose();
    log::info!("particle view torn down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_follows_flag() {
        let flag = MountFlag::new();
        let ticket = flag.ticket();
        assert!(ticket.is_live());
        flag.unmount();
        assert!(!ticket.is_live());
    }

    #[test]
    fn debouncer_keeps_latest_value() {
        let mut d = Debouncer::new(50.0);
        assert!(!d.is_pending());
        d.schedule(0.0, 1);
        d.schedule(30.0, 2);
        assert_eq!(d.poll(60.0), None);
        assert!(d.is_pending());
        assert_eq!(d.poll(80.0), Some(2));
        assert!(!d.is_pending());
        assert_eq!(d.poll(200.0), None);
    }

    #[test]
    fn ready_covers_both_settled_phases() {
        assert!(Phase::Ready.is_ready());
        assert!(Phase::ReadyEmpty.is_ready());
        assert!(!Phase::Loading.is_ready());
        assert!(!Phase::Disposed.is_ready());
    }

    #[test]
    fn clock_reports_seconds() {
        let mut c = FrameClock::new();
        assert_eq!(c.tick(1000.0), 0.0);
        assert!((c.tick(1016.0) - 0.016).abs() < 1e-6);
        assert_eq!(c.tick(1010.0), 0.0);
    }
}
