use glam::Vec3;

/// Cutoff angles at or below this many degrees classify a light as directional.
const DIRECTIONAL_CUTOFF_THRESHOLD_DEG: f32 = 0.001;

/// Far plane used for shadow rendering when a light carries no `max_dist` hint.
pub const DEFAULT_SHADOW_FAR: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

/// A scene light. The kind is fixed at construction and never changes.
#[derive(Clone, Copy, Debug)]
pub struct Light {
    pub position: Vec3,
    kind: LightKind,
    /// Resolved world-space direction for directional/spot lights.
    pub direction: Vec3,
    /// Fallback used by `effective_direction` when `direction` is zero.
    pub local_direction: Vec3,
    /// Cosine of the inner cutoff half-angle; -1.0 for directional lights.
    pub cut_off: f32,
    /// Cosine of the outer cutoff half-angle; -1.0 for directional lights.
    pub outer_cut_off: f32,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
    /// Shadow far-plane hint; values <= 0 fall back to [`DEFAULT_SHADOW_FAR`].
    pub max_dist: f32,
    pub color: Vec3,
}

impl Light {
    /// A point light with the given attenuation triple.
    pub fn point(color: Vec3, constant: f32, linear: f32, quadratic: f32, max_dist: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            kind: LightKind::Point,
            direction: Vec3::ZERO,
            local_direction: Vec3::ZERO,
            cut_off: -1.0,
            outer_cut_off: -1.0,
            constant,
            linear,
            quadratic,
            max_dist,
            color,
        }
    }

    /// A directed light. Both cutoff angles at or below the threshold mean
    /// "no cutoff" and classify the light as directional; otherwise it is a
    /// spot light and the cutoffs are stored as cosines of the half-angles.
    #[allow(clippy::too_many_arguments)]
    pub fn aimed(
        color: Vec3,
        direction: Vec3,
        cut_off_deg: f32,
        outer_cut_off_deg: f32,
        constant: f32,
        linear: f32,
        quadratic: f32,
        max_dist: f32,
    ) -> Self {
        let directional = cut_off_deg <= DIRECTIONAL_CUTOFF_THRESHOLD_DEG
            && outer_cut_off_deg <= DIRECTIONAL_CUTOFF_THRESHOLD_DEG;

        let len = direction.length();
        let dir = if len > 0.0 {
            direction / len
        } else {
            Vec3::ZERO
        };

        let (cut_off, outer_cut_off) = if directional {
            (-1.0, -1.0)
        } else {
            (
                cut_off_deg.to_radians().cos(),
                outer_cut_off_deg.to_radians().cos(),
            )
        };

        Self {
            position: Vec3::ZERO,
            kind: if directional {
                LightKind::Directional
            } else {
                LightKind::Spot
            },
            direction: dir,
            local_direction: dir,
            cut_off,
            outer_cut_off,
            constant,
            linear,
            quadratic,
            max_dist,
            color,
        }
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    pub fn is_point(&self) -> bool {
        self.kind == LightKind::Point
    }

    /// World direction the light shines in: the explicit `direction` when it
    /// has positive magnitude, renormalized only when its length strays from
    /// 1 by more than a small epsilon; else `local_direction`; else zero.
    /// Callers must treat a zero result as "no direction".
    pub fn effective_direction(&self) -> Vec3 {
        let chosen = if self.direction.length() > 0.0 {
            self.direction
        } else {
            self.local_direction
        };
        let len = chosen.length();
        if len > 0.0 {
            if !(0.999..=1.001).contains(&len) {
                return chosen / len;
            }
            return chosen;
        }
        Vec3::ZERO
    }

    /// Far plane for this light's shadow rendering.
    pub fn shadow_far_plane(&self) -> f32 {
        if self.max_dist > 0.0 {
            self.max_dist
        } else {
            DEFAULT_SHADOW_FAR
        }
    }
}
