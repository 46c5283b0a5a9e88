//! Channel layouts and the stereo mixing matrix.

use symphonia::core::audio::{Channels, Layout};

const MINUS_3DB: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Channel count plus speaker positions, in interleaved order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelLayout {
    positions: Channels,
}

impl ChannelLayout {
    pub fn stereo() -> Self {
        Self {
            positions: Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
        }
    }

    pub fn from_positions(positions: Channels) -> Self {
        Self { positions }
    }

    /// Conventional layout for a bare channel count.
    pub fn default_for_count(count: usize) -> Option<Self> {
        let positions = match count {
            0 => return None,
            1 => Layout::Mono.into_channels(),
            2 => Layout::Stereo.into_channels(),
            3 => Layout::TwoPointOne.into_channels(),
            4 => {
                Channels::FRONT_LEFT
                    | Channels::FRONT_RIGHT
                    | Channels::REAR_LEFT
                    | Channels::REAR_RIGHT
            }
            5 => {
                Channels::FRONT_LEFT
                    | Channels::FRONT_RIGHT
                    | Channels::FRONT_CENTRE
                    | Channels::REAR_LEFT
                    | Channels::REAR_RIGHT
            }
            6 => Layout::FivePointOne.into_channels(),
            8 => {
                Layout::FivePointOne.into_channels() | Channels::SIDE_LEFT | Channels::SIDE_RIGHT
            }
            n if n < 32 => Channels::from_bits_truncate((1u32 << n) - 1),
            _ => return None,
        };
        Some(Self { positions })
    }

    /// Resolve the layout of a stream: explicit positions win, then a coded layout, then
    /// the default for the channel count.
    pub fn resolve(
        positions: Option<Channels>,
        coded: Option<Layout>,
        count: Option<usize>,
    ) -> Option<Self> {
        if let Some(p) = positions.filter(|p| p.count() > 0) {
            return Some(Self::from_positions(p));
        }
        if let Some(layout) = coded {
            return Some(Self::from_positions(layout.into_channels()));
        }
        count.and_then(Self::default_for_count)
    }

    pub fn count(&self) -> usize {
        self.positions.count()
    }

    pub fn positions(&self) -> Channels {
        self.positions
    }

    /// Per-source-channel `(left, right)` coefficients for a stereo downmix.
    ///
    /// Rows are scaled so neither output can exceed the peak of its inputs.
    pub fn stereo_matrix(&self) -> Vec<(f32, f32)> {
        let count = self.count();
        if count == 1 {
            return vec![(1.0, 1.0)];
        }

        let mut matrix: Vec<(f32, f32)> = self.positions.iter().map(stereo_weights).collect();
        let left: f32 = matrix.iter().map(|(l, _)| l).sum();
        let right: f32 = matrix.iter().map(|(_, r)| r).sum();
        let peak = left.max(right);
        if peak > 1.0 {
            for (l, r) in matrix.iter_mut() {
                *l /= peak;
                *r /= peak;
            }
        }
        matrix
    }
}

fn stereo_weights(position: Channels) -> (f32, f32) {
    if position == Channels::FRONT_LEFT {
        (1.0, 0.0)
    } else if position == Channels::FRONT_RIGHT {
        (0.0, 1.0)
    } else if position == Channels::LFE1 || position == Channels::LFE2 {
        (0.0, 0.0)
    } else if position.intersects(
        Channels::REAR_LEFT
            | Channels::SIDE_LEFT
            | Channels::FRONT_LEFT_CENTRE
            | Channels::REAR_LEFT_CENTRE
            | Channels::FRONT_LEFT_WIDE
            | Channels::FRONT_LEFT_HIGH
            | Channels::TOP_FRONT_LEFT
            | Channels::TOP_REAR_LEFT,
    ) {
        (MINUS_3DB, 0.0)
    } else if position.intersects(
        Channels::REAR_RIGHT
            | Channels::SIDE_RIGHT
            | Channels::FRONT_RIGHT_CENTRE
            | Channels::REAR_RIGHT_CENTRE
            | Channels::FRONT_RIGHT_WIDE
            | Channels::FRONT_RIGHT_HIGH
            | Channels::TOP_FRONT_RIGHT
            | Channels::TOP_REAR_RIGHT,
    ) {
        (0.0, MINUS_3DB)
    } else {
        // centre-ish positions
        (MINUS_3DB, MINUS_3DB)
    }
}
