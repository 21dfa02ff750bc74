//! Restart-safe timed interpolation of named parameter groups.
//!
//! Each group owns at most one [`TransitionJob`]. Retargeting a group captures
//! the value currently shown on screen as the new start, so a signal that
//! flips mid-flight never produces a visible jump.

use super::scene_state::{Bloom, DayNight, SceneState};

/// Drift below this is left alone when a group is idle
pub const SETTLE_EPSILON: f32 = 1e-4;

/// Ease-in-out cubic: accelerates until the midpoint, then decelerates
pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Values that can be interpolated by the engine
pub trait Lerp: Copy {
    fn lerp(self, target: Self, t: f32) -> Self;

    /// Largest per-component distance to `other`
    fn distance(self, other: Self) -> f32;
}

impl Lerp for f32 {
    fn lerp(self, target: Self, t: f32) -> Self {
        self + (target - self) * t
    }

    fn distance(self, other: Self) -> f32 {
        (self - other).abs()
    }
}

impl Lerp for DayNight {
    fn lerp(self, target: Self, t: f32) -> Self {
        Self {
            blend: self.blend.lerp(target.blend, t),
            cloud_opacity: self.cloud_opacity.lerp(target.cloud_opacity, t),
        }
    }

    fn distance(self, other: Self) -> f32 {
        self.blend
            .distance(other.blend)
            .max(self.cloud_opacity.distance(other.cloud_opacity))
    }
}

impl Lerp for Bloom {
    fn lerp(self, target: Self, t: f32) -> Self {
        Self {
            threshold: self.threshold.lerp(target.threshold, t),
            strength: self.strength.lerp(target.strength, t),
            radius: self.radius.lerp(target.radius, t),
        }
    }

    fn distance(self, other: Self) -> f32 {
        self.threshold
            .distance(other.threshold)
            .max(self.strength.distance(other.strength))
            .max(self.radius.distance(other.radius))
    }
}

/// Independently animated parameter groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamGroup {
    DayNight,
    Bloom,
    SurfaceFade,
}

/// A new target for one group
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupTarget {
    DayNight(DayNight),
    Bloom(Bloom),
    SurfaceFade(f32),
}

impl GroupTarget {
    pub fn group(&self) -> ParamGroup {
        match self {
            GroupTarget::DayNight(_) => ParamGroup::DayNight,
            GroupTarget::Bloom(_) => ParamGroup::Bloom,
            GroupTarget::SurfaceFade(_) => ParamGroup::SurfaceFade,
        }
    }
}

/// One in-flight interpolation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionJob<T> {
    pub start: T,
    pub target: T,
    pub started_at: f32,
    pub duration: f32,
}

impl<T: Lerp> TransitionJob<T> {
    pub fn new(start: T, target: T, started_at: f32, duration: f32) -> Self {
        Self {
            start,
            target,
            started_at,
            duration,
        }
    }

    /// Normalized elapsed time in [0, 1]
    pub fn progress(&self, now: f32) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration).clamp(0.0, 1.0)
    }

    /// Interpolated value at `now`; exactly `target` once complete
    pub fn sample(&self, now: f32) -> T {
        let t = self.progress(now);
        if t >= 1.0 {
            self.target
        } else {
            self.start.lerp(self.target, ease_in_out_cubic(t))
        }
    }

    pub fn is_complete(&self, now: f32) -> bool {
        self.progress(now) >= 1.0
    }
}

/// A group's job slot plus the target it last settled on
#[derive(Debug, Clone)]
struct Track<T> {
    job: Option<TransitionJob<T>>,
    target: T,
}

impl<T: Lerp + PartialEq> Track<T> {
    fn settled(value: T) -> Self {
        Self {
            job: None,
            target: value,
        }
    }

    fn retarget(&mut self, current: T, target: T, now: f32, duration: f32) {
        if self.job.is_some_and(|job| job.target == target) {
            return;
        }
        self.target = target;
        if current.distance(target) <= SETTLE_EPSILON {
            self.job = None;
            return;
        }
        self.job = Some(TransitionJob::new(current, target, now, duration));
    }

    /// Value to write this frame, if any
    fn advance(&mut self, current: T, now: f32) -> Option<T> {
        match self.job {
            Some(job) => {
                let value = job.sample(now);
                if job.is_complete(now) {
                    self.job = None;
                }
                Some(value)
            }
            None => (current.distance(self.target) > SETTLE_EPSILON).then_some(self.target),
        }
    }
}

/// Drives every parameter group toward its target
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    day_night: Track<DayNight>,
    bloom: Track<Bloom>,
    fade: Track<f32>,
    theme_duration: f32,
    fade_duration: f32,
}

impl TransitionEngine {
    /// Engine at rest on the values already in `state`
    pub fn new(state: &SceneState, theme_duration: f32, fade_duration: f32) -> Self {
        Self {
            day_night: Track::settled(state.day_night()),
            bloom: Track::settled(state.bloom),
            fade: Track::settled(state.surface_opacity),
            theme_duration,
            fade_duration,
        }
    }

    /// Start (or restart) the job for the target's group from the live value in `state`
    pub fn retarget(&mut self, state: &SceneState, target: GroupTarget, now: f32) {
        log::debug!("retarget {:?} at t={:.3}", target.group(), now);
        match target {
            GroupTarget::DayNight(value) => {
                self.day_night
                    .retarget(state.day_night(), value, now, self.theme_duration)
            }
            GroupTarget::Bloom(value) => {
                self.bloom
                    .retarget(state.bloom, value, now, self.theme_duration)
            }
            GroupTarget::SurfaceFade(value) => {
                self.fade
                    .retarget(state.surface_opacity, value, now, self.fade_duration)
            }
        }
    }

    /// Write interpolated values for active groups; idle groups get drift corrected
    pub fn advance(&mut self, state: &mut SceneState, now: f32) {
        if let Some(value) = self.day_night.advance(state.day_night(), now) {
            state.set_day_night(value);
        }
        if let Some(value) = self.bloom.advance(state.bloom, now) {
            state.bloom = value;
        }
        if let Some(value) = self.fade.advance(state.surface_opacity, now) {
            state.surface_opacity = value.clamp(0.0, 1.0);
        }
    }

    pub fn is_active(&self, group: ParamGroup) -> bool {
        match group {
            ParamGroup::DayNight => self.day_night.job.is_some(),
            ParamGroup::Bloom => self.bloom.job.is_some(),
            ParamGroup::SurfaceFade => self.fade.job.is_some(),
        }
    }

    pub fn any_active(&self) -> bool {
        [ParamGroup::DayNight, ParamGroup::Bloom, ParamGroup::SurfaceFade]
            .into_iter()
            .any(|group| self.is_active(group))
    }

    pub fn fade_target(&self) -> f32 {
        self.fade.target
    }

    pub fn day_night_job(&self) -> Option<&TransitionJob<DayNight>> {
        self.day_night.job.as_ref()
    }
}
