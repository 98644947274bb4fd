//! # Arc planner
//!
//! Plans a single constant-curvature arc from the vehicle to the target point, split into
//! fixed-duration elements.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Deserialize;

use super::{DockPlanner, Remaining, Trajectory, TrajectoryElement};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ArcPlannerParams {
    /// Speed at which the arc is driven.
    ///
    /// Units: meters/second
    pub cruise_velocity_mps: f32,

    /// Duration of each trajectory element.
    ///
    /// Units: seconds
    pub element_duration_s: f32,

    /// Elements are only planned while their start is inside this horizon.
    ///
    /// Units: seconds
    pub horizon_s: f32,
}

/// Plans arcs to the most recent target point.
///
/// The remaining distance is taken from the last target planned to, before the first plan the
/// target is treated as infinitely far away.
pub struct ArcPlanner {
    params: ArcPlannerParams,
    last_target_m: Option<Vector2<f32>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArcPlanner {
    pub fn new(params: ArcPlannerParams) -> Self {
        Self {
            params,
            last_target_m: None,
        }
    }
}

impl DockPlanner for ArcPlanner {
    fn remaining_to_target(&self) -> Remaining {
        match self.last_target_m {
            Some(t) => Remaining {
                distance_x: t.x,
                distance_y: t.y,
                angle: t.y.atan2(t.x),
            },
            None => Remaining {
                distance_x: f32::MAX,
                distance_y: f32::MAX,
                angle: 0.0,
            },
        }
    }

    fn plan_trajectory(&mut self, target_m: Vector2<f32>) -> Trajectory {
        self.last_target_m = Some(target_m);

        let (x, y) = (target_m.x, target_m.y);

        // Targets behind the vehicle can't be reached with a forward arc
        if x <= 0.0 || !x.is_finite() || !y.is_finite() {
            return Trajectory::default();
        }

        if self.params.cruise_velocity_mps <= 0.0 || self.params.element_duration_s <= 0.0 {
            return Trajectory::default();
        }

        // Circle tangent to the forward axis at the origin and through the target
        let curvature = 2.0 * y / (x * x + y * y);

        let arc_length_m = if curvature.abs() < 1e-6 {
            x
        } else {
            2.0 * y.atan2(x) / curvature
        };

        let duration_s = arc_length_m / self.params.cruise_velocity_mps;
        let num_elements = (duration_s / self.params.element_duration_s).ceil().max(1.0) as usize;

        let elements = (0..num_elements)
            .map(|i| TrajectoryElement {
                curvature,
                linear_velocity: self.params.cruise_velocity_mps,
                relative_time_s: i as f32 * self.params.element_duration_s,
            })
            .take_while(|e| e.relative_time_s < self.params.horizon_s)
            .collect();

        Trajectory { elements }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn planner() -> ArcPlanner {
        ArcPlanner::new(ArcPlannerParams {
            cruise_velocity_mps: 0.5,
            element_duration_s: 0.1,
            horizon_s: 0.25,
        })
    }

    #[test]
    fn test_straight_ahead() {
        let mut p = planner();
        assert_eq!(p.remaining_to_target().distance_x, f32::MAX);

        let traj = p.plan_trajectory(Vector2::new(0.07, 0.0));

        // 0.07 m at 0.5 m/s is 0.14 s, so two elements
        assert_eq!(traj.elements.len(), 2);
        assert_eq!(traj.elements[0].curvature, 0.0);
        assert_eq!(traj.elements[1].relative_time_s, 0.1);

        let rem = p.remaining_to_target();
        assert_eq!(rem.distance_x, 0.07);
        assert_eq!(rem.angle, 0.0);
    }

    #[test]
    fn test_arc_curvature_and_horizon() {
        let mut p = planner();

        // Point on the unit circle centred at (0, 1)
        let traj = p.plan_trajectory(Vector2::new(1.0, 1.0));
        assert!((traj.elements[0].curvature - 1.0).abs() < 1e-6);

        // Long arc is cut at the horizon
        assert_eq!(traj.elements.len(), 3);
        assert!(traj.elements.iter().all(|e| e.relative_time_s < 0.25));
    }

    #[test]
    fn test_target_behind_is_empty() {
        let mut p = planner();

        assert!(p.plan_trajectory(Vector2::new(-1.0, 0.5)).is_empty());
        assert!(p.plan_trajectory(Vector2::new(0.0, 0.5)).is_empty());
        assert_eq!(p.remaining_to_target().distance_y, 0.5);
    }
}
