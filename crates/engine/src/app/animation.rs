#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    #[default]
    Repeat,
}

/// Playback state for one clip on one node's mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationAction {
    clip: AnimationClip,
    time_seconds: f64,
    time_scale: f64,
    loop_mode: LoopMode,
    clamp_when_finished: bool,
    running: bool,
    finished: bool,
}

impl AnimationAction {
    fn new(clip: AnimationClip) -> Self {
        Self {
            clip,
            time_seconds: 0.0,
            time_scale: 1.0,
            loop_mode: LoopMode::Repeat,
            clamp_when_finished: false,
            running: false,
            finished: false,
        }
    }

    pub fn reset(&mut self) -> &mut Self {
        self.time_seconds = 0.0;
        self.running = false;
        self.finished = false;
        self
    }

    pub fn set_loop(&mut self, loop_mode: LoopMode) -> &mut Self {
        self.loop_mode = loop_mode;
        self
    }

    pub fn set_clamp_when_finished(&mut self, clamp: bool) -> &mut Self {
        self.clamp_when_finished = clamp;
        self
    }

    pub fn set_effective_time_scale(&mut self, time_scale: f64) -> &mut Self {
        self.time_scale = if time_scale.is_finite() {
            time_scale
        } else {
            1.0
        };
        self
    }

    pub fn play(&mut self) -> &mut Self {
        self.running = true;
        self.finished = false;
        self
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.time_seconds = 0.0;
    }

    pub fn clip(&self) -> &AnimationClip {
        &self.clip
    }

    pub fn time_seconds(&self) -> f64 {
        self.time_seconds
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Held on the last frame after a clamped play-once.
    pub fn is_frozen_on_last_frame(&self) -> bool {
        self.finished
            && self.clamp_when_finished
            && (self.time_seconds - self.clip.duration_seconds).abs() < 1e-9
    }

    /// Normalized playhead in `[0, 1]`, used by the renderer to pose a node.
    pub fn progress(&self) -> f32 {
        if self.clip.duration_seconds <= 0.0 {
            return if self.finished { 1.0 } else { 0.0 };
        }
        (self.time_seconds / self.clip.duration_seconds).clamp(0.0, 1.0) as f32
    }

    fn advance(&mut self, dt_seconds: f64) {
        if !self.running {
            return;
        }
        let duration = self.clip.duration_seconds.max(0.0);
        self.time_seconds += dt_seconds * self.time_scale;
        match self.loop_mode {
            LoopMode::Repeat => {
                if duration > 0.0 {
                    self.time_seconds = self.time_seconds.rem_euclid(duration);
                }
            }
            LoopMode::Once => {
                if self.time_seconds >= duration {
                    self.running = false;
                    self.finished = true;
                    self.time_seconds = if self.clamp_when_finished {
                        duration
                    } else {
                        0.0
                    };
                }
            }
        }
    }
}

/// Per-node animation driver. Owns one action per clip name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationMixer {
    actions: Vec<AnimationAction>,
}

impl AnimationMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the action bound to `clip`, creating it on first use.
    pub fn clip_action(&mut self, clip: &AnimationClip) -> &mut AnimationAction {
        let index = match self
            .actions
            .iter()
            .position(|action| action.clip.name == clip.name)
        {
            Some(index) => index,
            None => {
                self.actions.push(AnimationAction::new(clip.clone()));
                self.actions.len() - 1
            }
        };
        &mut self.actions[index]
    }

    pub fn stop_all_action(&mut self) {
        for action in &mut self.actions {
            action.stop();
        }
    }

    pub fn update(&mut self, dt_seconds: f64) {
        for action in &mut self.actions {
            action.advance(dt_seconds);
        }
    }

    pub fn actions(&self) -> &[AnimationAction] {
        &self.actions
    }

    /// The action whose pose is on screen: the running one, else the last finished one.
    pub fn active_action(&self) -> Option<&AnimationAction> {
        self.actions
            .iter()
            .find(|action| action.running)
            .or_else(|| self.actions.iter().rev().find(|action| action.finished))
    }

    pub fn running_count(&self) -> usize {
        self.actions.iter().filter(|action| action.running).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(duration_seconds: f64) -> AnimationClip {
        AnimationClip {
            name: "take".to_string(),
            duration_seconds,
        }
    }

    #[test]
    fn play_once_clamped_holds_last_frame() {
        let mut mixer = AnimationMixer::new();
        mixer
            .clip_action(&clip(2.0))
            .reset()
            .set_loop(LoopMode::Once)
            .set_clamp_when_finished(true)
            .set_effective_time_scale(0.5)
            .play();

        mixer.update(3.9);
        let action = &mixer.actions()[0];
        assert!(action.is_running());
        assert!((action.time_seconds() - 1.95).abs() < 1e-9);

        mixer.update(0.2);
        let action = &mixer.actions()[0];
        assert!(!action.is_running());
        assert!(action.is_frozen_on_last_frame());
        assert_eq!(action.progress(), 1.0);

        mixer.update(5.0);
        assert!(mixer.actions()[0].is_frozen_on_last_frame());
    }

    #[test]
    fn play_once_without_clamp_snaps_back() {
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip(1.0)).set_loop(LoopMode::Once).play();
        mixer.update(1.5);
        let action = &mixer.actions()[0];
        assert!(action.is_finished());
        assert_eq!(action.time_seconds(), 0.0);
        assert!(!action.is_frozen_on_last_frame());
    }

    #[test]
    fn repeat_wraps_playhead() {
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip(1.0)).play();
        mixer.update(2.25);
        let action = &mixer.actions()[0];
        assert!(action.is_running());
        assert!((action.time_seconds() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn clip_action_reuses_existing_action() {
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip(1.0)).play();
        mixer.clip_action(&clip(1.0));
        assert_eq!(mixer.actions().len(), 1);
    }

    #[test]
    fn stop_all_action_halts_every_action() {
        let mut mixer = AnimationMixer::new();
        mixer.clip_action(&clip(1.0)).play();
        mixer
            .clip_action(&AnimationClip {
                name: "other".to_string(),
                duration_seconds: 3.0,
            })
            .play();
        assert_eq!(mixer.running_count(), 2);
        mixer.stop_all_action();
        assert_eq!(mixer.running_count(), 0);
    }
}
