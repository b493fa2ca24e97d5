use std::fmt;
use std::str::FromStr;

use crate::grid::Grid;
use crate::types::SingleChannelStyle;

const FIRST_CELL_CHANNEL: u8 = 4;
const LAST_CELL_CHANNEL: u8 = 15;

/// Which channels feed the displayed color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelMapping {
    #[default]
    Rgba,
    Red,
    Green,
    Blue,
    Alpha,
    /// One hidden channel, shown as grayscale.
    Cell(CellChannel),
}

/// Index of a hidden channel, always within 4..=15.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellChannel(u8);

impl CellChannel {
    pub fn new(channel: u8) -> Option<Self> {
        (FIRST_CELL_CHANNEL..=LAST_CELL_CHANNEL)
            .contains(&channel)
            .then_some(Self(channel))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown channel mapping {0:?}")]
pub struct MappingError(pub String);

impl ChannelMapping {
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::Rgba, Self::Red, Self::Green, Self::Blue, Self::Alpha]
            .into_iter()
            .chain(
                (FIRST_CELL_CHANNEL..=LAST_CELL_CHANNEL).map(|channel| Self::Cell(CellChannel(channel))),
            )
    }

    /// `None` unless `channel` is one of the hidden channels 4..=15.
    pub fn cell(channel: u8) -> Option<Self> {
        CellChannel::new(channel).map(Self::Cell)
    }

    pub fn label(self) -> String {
        match self {
            Self::Rgba => "RGBA (Channels 0-3)".to_owned(),
            Self::Red => "Red (Channel 0)".to_owned(),
            Self::Green => "Green (Channel 1)".to_owned(),
            Self::Blue => "Blue (Channel 2)".to_owned(),
            Self::Alpha => "Alpha (Channel 3)".to_owned(),
            Self::Cell(channel) => format!("Cell Channel {}", channel.get()),
        }
    }

    /// Straight RGBA in [0, 1] space for one cell.
    fn sample(self, grid: &Grid, style: SingleChannelStyle, y: usize, x: usize) -> [f32; 4] {
        let single = |channel: usize, tint: usize| {
            let value = grid.get(channel, y, x);
            match style {
                SingleChannelStyle::Grayscale => [value, value, value, 1.0],
                SingleChannelStyle::Tinted => {
                    let mut px = [0.0, 0.0, 0.0, 1.0];
                    px[tint] = value;
                    px
                }
            }
        };

        match self {
            Self::Rgba => [
                grid.get(0, y, x),
                grid.get(1, y, x),
                grid.get(2, y, x),
                grid.get(3, y, x),
            ],
            Self::Red => single(0, 0),
            Self::Green => single(1, 1),
            Self::Blue => single(2, 2),
            Self::Alpha => single(3, 3),
            Self::Cell(channel) => {
                let value = grid.get(channel.get() as usize, y, x);
                [value, value, value, 1.0]
            }
        }
    }
}

impl fmt::Display for ChannelMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgba => f.write_str("rgba"),
            Self::Red => f.write_str("r"),
            Self::Green => f.write_str("g"),
            Self::Blue => f.write_str("b"),
            Self::Alpha => f.write_str("a"),
            Self::Cell(channel) => write!(f, "c{}", channel.get()),
        }
    }
}

impl FromStr for ChannelMapping {
    type Err = MappingError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "rgba" => Ok(Self::Rgba),
            "r" => Ok(Self::Red),
            "g" => Ok(Self::Green),
            "b" => Ok(Self::Blue),
            "a" => Ok(Self::Alpha),
            other => other
                .strip_prefix('c')
                .and_then(|digits| digits.parse::<u8>().ok())
                .and_then(Self::cell)
                .ok_or_else(|| MappingError(other.to_owned())),
        }
    }
}

/// Scales a channel value to a byte, rounding half away from zero.
pub fn to_byte(value: f32) -> u8 {
    // NaN saturates to 0 in the cast.
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Renders the grid into `out` as RGBA8, resizing it to `width*height*4`.
pub fn render_into(
    grid: &Grid,
    mapping: ChannelMapping,
    style: SingleChannelStyle,
    out: &mut Vec<u8>,
) {
    let shape = grid.shape();
    out.resize(shape.plane() * 4, 0);

    for y in 0..shape.height {
        for x in 0..shape.width {
            let px = mapping.sample(grid, style, y, x);
            let offset = (y * shape.width + x) * 4;
            for (slot, value) in out[offset..offset + 4].iter_mut().zip(px) {
                *slot = to_byte(value);
            }
        }
    }
}
