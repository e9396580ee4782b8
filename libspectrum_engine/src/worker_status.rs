/// Which phase of a replay the progress belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BarColor {
    #[default]
    CYAN,
    GREEN,
    MAGENTA,
}

/// Progress message sent from a replay to whoever drives it
#[derive(Debug, Clone, Default)]
pub struct ReplayStatus {
    pub progress: f32,
    pub spill_index: usize,
    pub color: BarColor,
}

impl ReplayStatus {
    pub fn new(progress: f32, spill_index: usize, color: BarColor) -> Self {
        Self {
            progress,
            spill_index,
            color,
        }
    }
}
