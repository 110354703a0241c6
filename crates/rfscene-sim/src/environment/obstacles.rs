//! Static and moving obstacles

use super::config::ObstacleConfig;
use rand::Rng;
use rfscene_core::config::sample_span;
use rfscene_core::coordinates::{horizontal_distance, MapBounds};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StaticObstacle {
    /// `[x, y, z]` of the footprint centre
    pub center: [f64; 3],
    pub radius: f64,
    pub height: f64,
}

impl StaticObstacle {
    /// Whether a position lies inside the obstacle footprint
    pub fn collides(&self, position: &[f64; 3]) -> bool {
        horizontal_distance(&self.center, position) < self.radius
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DynamicObstacle {
    pub center: [f64; 3],
    pub radius: f64,
    pub height: f64,
    /// `[vx, vy]` in m/s
    pub velocity: [f64; 2],
}

impl DynamicObstacle {
    /// Move by one frame, reflecting off the map bounds
    pub fn advance(&mut self, dt: f64, bounds: &MapBounds) {
        let limits = [(bounds.x_min, bounds.x_max), (bounds.y_min, bounds.y_max)];
        for (axis, (lo, hi)) in limits.iter().enumerate() {
            let mut p = self.center[axis] + self.velocity[axis] * dt;
            if p < *lo {
                p = lo + (lo - p);
                self.velocity[axis] = -self.velocity[axis];
            } else if p > *hi {
                p = hi - (p - hi);
                self.velocity[axis] = -self.velocity[axis];
            }
            self.center[axis] = p.clamp(*lo, *hi);
        }
    }
}

fn random_center<R: Rng + ?Sized>(bounds: &MapBounds, rng: &mut R) -> [f64; 3] {
    [
        rng.gen_range(bounds.x_min..=bounds.x_max),
        rng.gen_range(bounds.y_min..=bounds.y_max),
        0.0,
    ]
}

pub fn spawn_static<R: Rng + ?Sized>(
    config: &ObstacleConfig,
    bounds: &MapBounds,
    rng: &mut R,
) -> Vec<StaticObstacle> {
    let count = config.count.sample(rng);
    (0..count)
        .map(|_| StaticObstacle {
            center: random_center(bounds, rng),
            radius: sample_span(config.radius, rng),
            height: sample_span(config.height, rng),
        })
        .collect()
}

pub fn spawn_dynamic<R: Rng + ?Sized>(
    config: &ObstacleConfig,
    bounds: &MapBounds,
    rng: &mut R,
) -> Vec<DynamicObstacle> {
    let count = config.count.sample(rng);
    (0..count)
        .map(|_| {
            let center = random_center(bounds, rng);
            let speed = sample_span(config.speed, rng);
            let heading = rng.gen_range(0.0..std::f64::consts::TAU);
            DynamicObstacle {
                center,
                radius: sample_span(config.radius, rng),
                height: sample_span(config.height, rng),
                velocity: [speed * heading.cos(), speed * heading.sin()],
            }
        })
        .collect()
}
