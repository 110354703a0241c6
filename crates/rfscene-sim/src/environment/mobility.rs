//! Entity mobility models
//!
//! Each frame the simulator first integrates `position += velocity * dt`,
//! then lets the entity's mobility model override the result.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rfscene_core::coordinates::MapBounds;
use serde::{Deserialize, Serialize};

/// Mobility model names accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MobilityKind {
    Stationary,
    RandomWalk,
    Waypoint,
}

/// Per-entity mobility state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MobilityModel {
    /// No override; the entity drifts by its own velocity
    Stationary,
    /// Heading perturbed by a Gaussian turn each frame, speed preserved
    RandomWalk { turn_sigma_deg: f64 },
    /// Straight-line travel toward a target inside the map
    Waypoint {
        target: Option<[f64; 2]>,
        speed: f64,
        arrival_radius: f64,
    },
}

impl MobilityModel {
    pub fn kind(&self) -> MobilityKind {
        match self {
            MobilityModel::Stationary => MobilityKind::Stationary,
            MobilityModel::RandomWalk { .. } => MobilityKind::RandomWalk,
            MobilityModel::Waypoint { .. } => MobilityKind::Waypoint,
        }
    }

    /// Replacement `(position, velocity)` after the frame's integration
    /// step, or `None` to keep the integrated state.
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        position: [f64; 3],
        velocity: [f64; 3],
        dt: f64,
        bounds: &MapBounds,
        rng: &mut R,
    ) -> Option<([f64; 3], [f64; 3])> {
        match self {
            MobilityModel::Stationary => None,

            MobilityModel::RandomWalk { turn_sigma_deg } => {
                if *turn_sigma_deg <= 0.0 {
                    return None;
                }
                let turn = Normal::new(0.0, turn_sigma_deg.to_radians())
                    .ok()?
                    .sample(rng);
                let (sin, cos) = turn.sin_cos();
                let vx = velocity[0] * cos - velocity[1] * sin;
                let vy = velocity[0] * sin + velocity[1] * cos;
                Some((position, [vx, vy, velocity[2]]))
            }

            MobilityModel::Waypoint {
                target,
                speed,
                arrival_radius,
            } => {
                let reached = match target {
                    Some(t) => {
                        let dx = t[0] - position[0];
                        let dy = t[1] - position[1];
                        (dx * dx + dy * dy).sqrt() <= *arrival_radius + *speed * dt
                    }
                    None => true,
                };

                let mut position = position;
                if reached {
                    if let Some(t) = *target {
                        // Snap onto the waypoint instead of overshooting it
                        position[0] = t[0];
                        position[1] = t[1];
                    }
                    *target = Some([
                        rng.gen_range(bounds.x_min..=bounds.x_max),
                        rng.gen_range(bounds.y_min..=bounds.y_max),
                    ]);
                }

                let t = (*target)?;
                let dx = t[0] - position[0];
                let dy = t[1] - position[1];
                let distance = (dx * dx + dy * dy).sqrt();
                let velocity = if distance > 0.0 {
                    [*speed * dx / distance, *speed * dy / distance, 0.0]
                } else {
                    [0.0; 3]
                };
                Some((position, velocity))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bounds() -> MapBounds {
        MapBounds::centered(200.0, 200.0)
    }

    #[test]
    fn test_stationary_keeps_integrated_state() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut m = MobilityModel::Stationary;
        assert!(m.update([1.0, 2.0, 3.0], [4.0, 0.0, 0.0], 1.0, &bounds(), &mut rng).is_none());
    }

    #[test]
    fn test_random_walk_preserves_speed() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut m = MobilityModel::RandomWalk { turn_sigma_deg: 30.0 };
        let mut v = [3.0, 4.0, 0.0];
        for _ in 0..20 {
            let (_, next) = m.update([0.0; 3], v, 1.0, &bounds(), &mut rng).unwrap();
            v = next;
            let speed = (v[0] * v[0] + v[1] * v[1]).sqrt();
            assert!((speed - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_waypoint_heads_to_target_inside_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut m = MobilityModel::Waypoint {
            target: None,
            speed: 2.0,
            arrival_radius: 1.0,
        };
        let (_, v) = m.update([0.0, 0.0, 10.0], [0.0; 3], 1.0, &bounds(), &mut rng).unwrap();
        let speed = (v[0] * v[0] + v[1] * v[1]).sqrt();
        assert!((speed - 2.0).abs() < 1e-9);
        match m {
            MobilityModel::Waypoint { target: Some(t), .. } => assert!(bounds().contains(t[0], t[1])),
            other => panic!("unexpected model {:?}", other),
        }
    }

    #[test]
    fn test_waypoint_picks_new_target_on_arrival() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut m = MobilityModel::Waypoint {
            target: Some([10.0, 0.0]),
            speed: 5.0,
            arrival_radius: 1.0,
        };
        let (p, _) = m.update([9.5, 0.0, 10.0], [5.0, 0.0, 0.0], 1.0, &bounds(), &mut rng).unwrap();
        assert_eq!(p[0], 10.0);
        match m {
            MobilityModel::Waypoint { target: Some(t), .. } => assert_ne!(t, [10.0, 0.0]),
            other => panic!("unexpected model {:?}", other),
        }
    }
}
