/// Tuning knobs of a [`Painter`](crate::Painter).
///
/// ```
/// use quilt::PainterConfig;
///
/// let config = PainterConfig::default().with_cache_enabled(false);
/// assert_eq!(config.trim_current_interval, 99);
/// assert!(!config.cache_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PainterConfig {
    /// Idle batches of the cache processor are released every this many frames. Zero disables.
    pub trim_current_interval: u32,
    /// Same for the speculative processor. Staggered against the cache interval.
    pub trim_speculative_interval: u32,
    /// Whether frames start out recording into the replayable cache.
    pub cache_enabled: bool,
    pub state_stack_capacity: usize,
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            trim_current_interval: 99,
            trim_speculative_interval: 150,
            cache_enabled: true,
            state_stack_capacity: 16,
        }
    }
}

impl PainterConfig {
    pub fn with_trim_intervals(mut self, current: u32, speculative: u32) -> Self {
        self.trim_current_interval = current;
        self.trim_speculative_interval = speculative;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_state_stack_capacity(mut self, capacity: usize) -> Self {
        self.state_stack_capacity = capacity;
        self
    }
}

/// The stage area shown by the back buffer. Sizes are logical; `scale_factor` converts them to
/// physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale_factor: f64,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            scale_factor: 1.0,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn physical_size(&self) -> (u32, u32) {
        let scale = |logical: f32| ((logical as f64 * self.scale_factor).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}
