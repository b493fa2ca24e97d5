use std::time::Duration;

pub const CHANNELS: usize = 16;
pub const GRID_HEIGHT: usize = 64;
pub const GRID_WIDTH: usize = 64;

/// Step intervals in milliseconds, indexed by speed setting.
const SPEED_TABLE_MS: [u64; 7] = [200, 100, 40, 20, 10, 5, 2];
const SPEED_LABELS: [&str; 7] = ["1/10x", "1/5x", "1/2x", "1x", "2x", "4x", "8x"];
const DEFAULT_INTERVAL_MS: u64 = 20;

/// Shape of the state tensor, always with a batch of one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl GridShape {
    pub const NCA: Self = Self {
        channels: CHANNELS,
        height: GRID_HEIGHT,
        width: GRID_WIDTH,
    };

    pub fn plane(&self) -> usize {
        self.height * self.width
    }

    pub fn volume(&self) -> usize {
        self.channels * self.plane()
    }

    /// NCHW dims as fed to the backend.
    pub fn dims(&self) -> [usize; 4] {
        [1, self.channels, self.height, self.width]
    }
}

impl Default for GridShape {
    fn default() -> Self {
        Self::NCA
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpeedSetting(pub u8);

impl SpeedSetting {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = (SPEED_TABLE_MS.len() - 1) as u8;

    pub fn interval(self) -> Duration {
        let ms = SPEED_TABLE_MS
            .get(self.0 as usize)
            .copied()
            .unwrap_or(DEFAULT_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    pub fn label(self) -> &'static str {
        SPEED_LABELS.get(self.0 as usize).copied().unwrap_or("1x")
    }
}

impl Default for SpeedSetting {
    fn default() -> Self {
        Self(3)
    }
}

/// What the hidden channels of the seed cell hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SeedVariant {
    /// Every channel carries the seed value.
    #[default]
    Mirrored,
    /// Only channels 0-3 carry the seed value.
    RgbaOnly,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeedConfig {
    pub variant: SeedVariant,
    pub value: f32,
    /// Half-width of the seeded square; 0 seeds the single center cell.
    pub radius: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            variant: SeedVariant::Mirrored,
            value: 0.8,
            radius: 0,
        }
    }
}

/// How the `r`, `g`, `b` and `a` mappings are drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SingleChannelStyle {
    /// Selected channel replicated into R, G and B, fully opaque.
    #[default]
    Grayscale,
    /// Selected channel in its own component on black.
    Tinted,
}

#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    pub shape: GridShape,
    pub seed: SeedConfig,
    pub speed: SpeedSetting,
    pub single_channel: SingleChannelStyle,
    pub erase_radius: i32,
    pub autostart: bool,
    pub inference_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shape: GridShape::NCA,
            seed: SeedConfig::default(),
            speed: SpeedSetting::default(),
            single_channel: SingleChannelStyle::default(),
            erase_radius: 5,
            autostart: true,
            inference_timeout: Duration::from_millis(2000),
        }
    }
}

/// Summary of the buffer after a step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridStats {
    pub mean: f32,
    pub min: f32,
    pub max: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_table_lookup() {
        assert_eq!(SpeedSetting(0).interval(), Duration::from_millis(200));
        assert_eq!(SpeedSetting(3).interval(), Duration::from_millis(20));
        assert_eq!(SpeedSetting(5).interval(), Duration::from_millis(5));
        assert_eq!(SpeedSetting(6).interval(), Duration::from_millis(2));
    }

    #[test]
    fn out_of_range_speed_falls_back_to_one_x() {
        assert_eq!(SpeedSetting(99).interval(), Duration::from_millis(20));
        assert_eq!(SpeedSetting(7).label(), "1x");
        assert_eq!(SpeedSetting::default().interval(), SpeedSetting(99).interval());
    }

    #[test]
    fn nca_shape_is_fixed() {
        let shape = GridShape::default();
        assert_eq!(shape.dims(), [1, 16, 64, 64]);
        assert_eq!(shape.volume(), 16 * 64 * 64);
        assert_eq!(shape.plane(), 4096);
    }
}
