use glam::{EulerRot, Quat, Vec2};

use crate::params::FishParams;

/// What a fish does this frame. Turning always takes priority over moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steering {
    TurnRight,
    TurnLeft,
    Translate,
}

/// Planar position (X, Y) plus yaw about the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub position: Vec2,
    pub yaw: f32,
}

/// Yaw read back from a rotation lands within this of the bound it was set to.
const BOUND_TOLERANCE: f32 = 1e-4;

/// Yaw about the vertical axis, in `(-π, π]`.
pub fn yaw_of(rotation: Quat) -> f32 {
    rotation.to_euler(EulerRot::YXZ).0
}

pub fn decide(position: Vec2, destination: Vec2, yaw: f32, params: &FishParams) -> Steering {
    let dist_x = destination.x - position.x;
    if dist_x > 0.0 && yaw < params.right_bound - BOUND_TOLERANCE {
        Steering::TurnRight
    } else if dist_x < 0.0 && yaw > params.left_bound + BOUND_TOLERANCE {
        Steering::TurnLeft
    } else {
        Steering::Translate
    }
}

/// One frame of motion toward `destination`.
///
/// Turning moves yaw by `turn_rate * velocity * delta`, stopping at the
/// bound. Translating closes the fraction `velocity * delta` of the
/// remaining distance, which can exceed 1 on long frames unless
/// `clamp_overshoot` is set.
pub fn advance(motion: Motion, destination: Vec2, delta: f32, params: &FishParams) -> Motion {
    let step = params.turn_rate * params.velocity * delta;
    match decide(motion.position, destination, motion.yaw, params) {
        Steering::TurnRight => Motion {
            yaw: (motion.yaw + step).min(params.right_bound),
            ..motion
        },
        Steering::TurnLeft => Motion {
            yaw: (motion.yaw - step).max(params.left_bound),
            ..motion
        },
        Steering::Translate => {
            let mut fraction = params.velocity * delta;
            if params.clamp_overshoot {
                fraction = fraction.min(1.0);
            }
            Motion {
                position: motion.position + (destination - motion.position) * fraction,
                ..motion
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn at(x: f32, y: f32, yaw: f32) -> Motion {
        Motion {
            position: Vec2::new(x, y),
            yaw,
        }
    }

    #[test]
    fn turn_right_by_rate_times_delta() {
        let params = FishParams {
            right_bound: PI,
            ..FishParams::default()
        };
        let dest = Vec2::new(5.0, 0.0);
        assert_eq!(decide(Vec2::ZERO, dest, 0.0, &params), Steering::TurnRight);

        let next = advance(at(0.0, 0.0, 0.0), dest, 0.1, &params);
        assert!((next.yaw - 0.628_318_5).abs() < 1e-5);
        assert_eq!(next.position, Vec2::ZERO);
    }

    #[test]
    fn turn_stops_at_bound() {
        let params = FishParams::default();
        let next = advance(at(0.0, 0.0, 1.5), Vec2::new(5.0, 0.0), 1.0, &params);
        assert_eq!(next.yaw, FRAC_PI_2);
        let next = advance(at(0.0, 0.0, -1.5), Vec2::new(-5.0, 0.0), 1.0, &params);
        assert_eq!(next.yaw, -FRAC_PI_2);
    }

    #[test]
    fn facing_destination_translates() {
        let params = FishParams::default();
        let dest = Vec2::new(4.0, 2.0);
        assert_eq!(decide(Vec2::ZERO, dest, FRAC_PI_2, &params), Steering::Translate);
        let next = advance(at(0.0, 0.0, FRAC_PI_2), dest, 0.25, &params);
        assert!((next.position - Vec2::new(1.0, 0.5)).length() < 1e-6);
        assert_eq!(next.yaw, FRAC_PI_2);
    }

    #[test]
    fn vertical_only_offset_translates_without_turning() {
        let params = FishParams::default();
        assert_eq!(
            decide(Vec2::new(3.0, 0.0), Vec2::new(3.0, 8.0), 0.0, &params),
            Steering::Translate
        );
    }

    #[test]
    fn converges_without_overshoot() {
        let params = FishParams::default();
        let dest = Vec2::new(5.0, 3.0);
        let mut motion = at(0.0, 0.0, 0.0);
        let mut turning = vec![motion.yaw];
        for _ in 0..600 {
            let next = advance(motion, dest, 1.0 / 60.0, &params);
            assert!(next.position.x <= dest.x + 1e-5);
            if next.position == Vec2::ZERO {
                turning.push(next.yaw);
            } else {
                // moving only once fully turned
                assert_eq!(next.yaw, FRAC_PI_2);
            }
            motion = next;
        }
        assert!(turning.len() > 2);
        assert!(turning.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(turning.last(), Some(&FRAC_PI_2));
        assert_eq!(motion.yaw, FRAC_PI_2);
        assert!((motion.position - dest).length() < 1e-2);
    }

    #[test]
    fn yaw_read_back_from_rotation() {
        for yaw in [-FRAC_PI_2, -0.3, 0.0, 1.2, FRAC_PI_2] {
            assert!((yaw_of(Quat::from_rotation_y(yaw)) - yaw).abs() < 1e-5);
        }
        // a yaw read back near the bound counts as at the bound
        let params = FishParams::default();
        let almost = FRAC_PI_2 - 1e-6;
        assert_eq!(
            decide(Vec2::ZERO, Vec2::new(5.0, 0.0), almost, &params),
            Steering::Translate
        );
    }

    #[test]
    fn long_frame_overshoots_unless_clamped() {
        let dest = Vec2::new(2.0, 0.0);
        let start = at(0.0, 0.0, FRAC_PI_2);

        let loose = advance(start, dest, 1.5, &FishParams::default());
        assert!(loose.position.x > dest.x);

        let clamped = FishParams {
            clamp_overshoot: true,
            ..FishParams::default()
        };
        let tight = advance(start, dest, 1.5, &clamped);
        assert_eq!(tight.position, dest);
    }
}
