use glam::Vec3;

/// One segment of a keyframe track: the object travels toward `position`
/// (and `rotation`, Euler degrees) over `duration` seconds.
#[derive(Clone, Copy, Debug)]
pub struct Keyframe {
    pub duration: f32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub ease_in: bool,
    pub ease_out: bool,
}

impl Keyframe {
    pub fn new(duration: f32, position: Vec3) -> Self {
        Self {
            duration,
            position,
            rotation: Vec3::ZERO,
            ease_in: false,
            ease_out: false,
        }
    }

    pub fn eased(duration: f32, position: Vec3, rotation: Vec3) -> Self {
        Self {
            duration,
            position,
            rotation,
            ease_in: true,
            ease_out: true,
        }
    }
}

/// Sampled state of a [`KeyframeTrack`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyframeSample {
    pub position: Vec3,
    pub rotation: Vec3,
}

/// Piecewise keyframe animation over position and rotation. The first frame
/// is the starting pose; each following frame is interpolated toward over
/// its own duration.
#[derive(Clone, Debug, Default)]
pub struct KeyframeTrack {
    frames: Vec<Keyframe>,
    elapsed: f32,
    looping: bool,
    finished: bool,
}

impl KeyframeTrack {
    pub fn new(frames: Vec<Keyframe>) -> Self {
        Self {
            frames,
            elapsed: 0.0,
            looping: false,
            finished: false,
        }
    }

    pub fn looping(frames: Vec<Keyframe>) -> Self {
        Self {
            looping: true,
            ..Self::new(frames)
        }
    }

    pub fn push(&mut self, frame: Keyframe) {
        self.frames.push(frame);
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn total_duration(&self) -> f32 {
        self.frames.iter().skip(1).map(|f| f.duration).sum()
    }

    /// Advances the clock and samples the current pose. Returns `None` for
    /// tracks with fewer than two frames or once a non-looping track is done
    /// (after yielding its final pose exactly once).
    pub fn advance(&mut self, dt: f32) -> Option<KeyframeSample> {
        if self.frames.len() < 2 || self.finished {
            return None;
        }

        self.elapsed += dt;
        let total = self.total_duration();
        let mut t = self.elapsed;
        if self.looping && total > 0.0 {
            t %= total;
        } else if t >= total {
            self.finished = true;
            let last = self.frames[self.frames.len() - 1];
            return Some(KeyframeSample {
                position: last.position,
                rotation: last.rotation,
            });
        }

        let mut from = self.frames[0];
        for to in self.frames.iter().skip(1) {
            if t <= to.duration || to.duration <= 0.0 {
                let mut alpha = if to.duration > 0.0 {
                    (t / to.duration).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                if to.ease_in || to.ease_out {
                    alpha = smoothstep(alpha);
                }
                return Some(KeyframeSample {
                    position: from.position.lerp(to.position, alpha),
                    rotation: from.rotation.lerp(to.rotation, alpha),
                });
            }
            t -= to.duration;
            from = *to;
        }

        let last = self.frames[self.frames.len() - 1];
        Some(KeyframeSample {
            position: last.position,
            rotation: last.rotation,
        })
    }
}

fn smoothstep(x: f32) -> f32 {
    x * x * (3.0 - 2.0 * x)
}
