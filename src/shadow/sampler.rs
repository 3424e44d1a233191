//! Sampling source for the percentage gate.

use rand::Rng;

pub trait Sampler: Send + Sync {
    /// Uniform draw in `1..=100`.
    fn draw(&self) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSampler;

impl Sampler for RandomSampler {
    fn draw(&self) -> u32 {
        rand::thread_rng().gen_range(1..=100)
    }
}

/// A request is shadowed when the draw does not exceed the percentage.
#[must_use]
pub fn admits(draw: u32, percentage: i32) -> bool {
    i64::from(draw) <= i64::from(percentage)
}
