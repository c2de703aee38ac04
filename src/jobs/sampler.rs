use async_trait::async_trait;
use rand::Rng;

use crate::store::Readings;

/// Produces one set of already-sampled readings per tick
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn sample(&self) -> Readings;
}

#[async_trait]
impl<F> Sampler for F
where
    F: Fn() -> Readings + Send + Sync,
{
    async fn sample(&self) -> Readings {
        self()
    }
}

/// Placeholder readings for boards without probes attached
///
/// Each channel gets `whole + tenth / 10` with `whole` in `-50..=100` and
/// `tenth` in `0..=9`, i.e. one decimal digit like the real probes.
#[derive(Debug, Clone)]
pub struct SimulatedSensors {
    channels: Vec<String>,
}

impl SimulatedSensors {
    pub fn new(channels: Vec<String>) -> Self {
        Self { channels }
    }

    fn draw(&self) -> Readings {
        let mut rng = rand::rng();
        self.channels
            .iter()
            .map(|channel| {
                let whole: i32 = rng.random_range(-50..=100);
                let tenth: i32 = rng.random_range(0..=9);
                (channel.clone(), f64::from(whole * 10 + tenth) / 10.0)
            })
            .collect()
    }
}

#[async_trait]
impl Sampler for SimulatedSensors {
    async fn sample(&self) -> Readings {
        self.draw()
    }
}
