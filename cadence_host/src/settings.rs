// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor configuration.

use cadence_core::memory::MemoryPolicy;
use cadence_core::scheduler::SchedulerSettings;
use cadence_core::time::Duration;

/// How the main and impl contexts are mapped onto threads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ThreadingMode {
    /// Both contexts share the embedder's thread. The impl side runs when
    /// the embedder pumps [`LayerTreeHost::process_messages`].
    ///
    /// [`LayerTreeHost::process_messages`]: crate::LayerTreeHost::process_messages
    #[default]
    SingleThreaded,
    /// The impl side runs on its own thread.
    Threaded,
}

/// Configuration passed to [`LayerTreeHost`](crate::LayerTreeHost) at
/// construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorSettings {
    /// Refresh rate hint for synthetic begin frames.
    pub refresh_rate_hz: f64,
    /// Whether a committed tree waits for a prepare-tiles pass before it may
    /// be activated.
    pub impl_side_painting: bool,
    /// Share of the hard memory limit kept for prepainting, in percent.
    pub prepaint_percent: u8,
    /// Failed output surface initializations after which the embedder is
    /// told to give up.
    pub max_output_surface_init_attempts: u32,
    /// Failed draws in a row after which a fresh commit is requested.
    pub max_consecutive_failed_draws: u32,
    /// EMA smoothing factor for scheduler timing estimates.
    pub timing_history_alpha: f32,
    /// Safety multiplier on the main-frame-to-commit estimate.
    pub commit_estimate_multiplier: f32,
    /// Memory policy in effect until the embedder supplies one.
    pub initial_memory_policy: MemoryPolicy,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CompositorSettings {
    /// 60 Hz, commits activate immediately.
    pub const DEFAULT: Self = Self {
        refresh_rate_hz: 60.0,
        impl_side_painting: false,
        prepaint_percent: 50,
        max_output_surface_init_attempts: 4,
        max_consecutive_failed_draws: SchedulerSettings::DEFAULT.max_consecutive_failed_draws,
        timing_history_alpha: SchedulerSettings::DEFAULT.timing_history_alpha,
        commit_estimate_multiplier: SchedulerSettings::DEFAULT.commit_estimate_multiplier,
        initial_memory_policy: MemoryPolicy::DEFAULT,
    };

    /// Like [`DEFAULT`](Self::DEFAULT), but activation waits for tiles.
    #[must_use]
    pub const fn impl_side_painting() -> Self {
        let mut settings = Self::DEFAULT;
        settings.impl_side_painting = true;
        settings
    }

    /// Returns the settings for the impl-side scheduler.
    #[must_use]
    pub const fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            impl_side_painting: self.impl_side_painting,
            max_consecutive_failed_draws: self.max_consecutive_failed_draws,
            timing_history_alpha: self.timing_history_alpha,
            commit_estimate_multiplier: self.commit_estimate_multiplier,
        }
    }

    /// Returns the begin-frame interval implied by the refresh rate.
    #[must_use]
    pub fn begin_frame_interval(&self) -> Duration {
        Duration::from_refresh_rate(self.refresh_rate_hz)
    }
}
