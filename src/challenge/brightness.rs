//! Display brightness override held while the challenge is visible.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::debug;

pub const MAX_BRIGHTNESS: f32 = 1.0;

/// Process-wide display brightness, `0.0..=1.0`.
pub trait Brightness: Send + Sync {
    fn level(&self) -> f32;

    fn set_level(&self, level: f32);
}

/// Forces maximum brightness and restores the prior level when dropped.
pub struct BrightnessGuard {
    device: Arc<dyn Brightness>,
    prior: f32,
}

impl BrightnessGuard {
    #[must_use]
    pub fn acquire(device: Arc<dyn Brightness>) -> Self {
        let prior = device.level();
        device.set_level(MAX_BRIGHTNESS);
        debug!(prior, "brightness override acquired");
        Self { device, prior }
    }

    #[must_use]
    pub fn prior(&self) -> f32 {
        self.prior
    }
}

impl Drop for BrightnessGuard {
    fn drop(&mut self) {
        self.device.set_level(self.prior);
        debug!(level = self.prior, "brightness restored");
    }
}

impl fmt::Debug for BrightnessGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrightnessGuard")
            .field("prior", &self.prior)
            .finish_non_exhaustive()
    }
}

/// In-memory brightness for hosts without a controllable backlight.
#[derive(Debug)]
pub struct SoftwareBrightness {
    level: Mutex<f32>,
}

impl SoftwareBrightness {
    #[must_use]
    pub fn new(level: f32) -> Self {
        Self {
            level: Mutex::new(level.clamp(0.0, MAX_BRIGHTNESS)),
        }
    }
}

impl Default for SoftwareBrightness {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Brightness for SoftwareBrightness {
    fn level(&self) -> f32 {
        *self.level.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_level(&self, level: f32) {
        let level = level.clamp(0.0, MAX_BRIGHTNESS);
        let mut current = self.level.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = *current, to = level, "software brightness changed");
        *current = level;
    }
}
