use rand::Rng;

/// Inclusive bounds plus the number of fractional digits a generated value keeps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReadingRange {
    pub min: f64,
    pub max: f64,
    pub decimals: u32,
}

impl ReadingRange {
    pub const fn new(min: f64, max: f64, decimals: u32) -> Self {
        Self { min, max, decimals }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        random_value(rng, self.min, self.max, self.decimals)
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Uniform draw over `[min, max]`, rounded to `decimals` fractional digits.
pub fn random_value<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64, decimals: u32) -> f64 {
    let raw = min + rng.random::<f64>() * (max - min);
    // Rounding may push a value just under `max` up to `max`, never past it.
    round_to(raw, decimals).clamp(min, max)
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
