// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Memory policy supplied by the embedder.
//!
//! A [`MemoryPolicy`] is an immutable value. The embedder replaces it
//! wholesale whenever budgets are recomputed (for example in response to an
//! OS pressure signal); the compositor never adjusts budgets on its own. The
//! impl side derives [`TileMemoryLimits`] from the current policy and its
//! visibility, and hands them to the resource layer as a read-only
//! constraint.

/// How much prepared content may stay resident, from least to most.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityCutoff {
    /// Keep nothing.
    AllowNothing,
    /// Keep only what is needed to draw the current viewport.
    AllowRequiredOnly,
    /// Also keep content that is likely to be needed soon.
    AllowNiceToHave,
    /// Keep everything.
    #[default]
    AllowEverything,
}

/// Urgency class of a piece of prepared content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityBin {
    /// Visible right now.
    Now,
    /// Expected to become visible shortly.
    Soon,
    /// Everything else.
    Eventually,
}

impl PriorityCutoff {
    /// Returns whether content in `bin` may be kept under this cutoff.
    #[must_use]
    pub const fn allows(self, bin: PriorityBin) -> bool {
        match self {
            Self::AllowNothing => false,
            Self::AllowRequiredOnly => matches!(bin, PriorityBin::Now),
            Self::AllowNiceToHave => matches!(bin, PriorityBin::Now | PriorityBin::Soon),
            Self::AllowEverything => true,
        }
    }
}

/// A byte ceiling paired with a priority cutoff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MemoryBudget {
    /// Maximum resident bytes.
    pub bytes_limit: u64,
    /// Least urgent content that may stay resident.
    pub priority_cutoff: PriorityCutoff,
}

impl MemoryBudget {
    /// A budget that keeps nothing.
    pub const NOTHING: Self = Self {
        bytes_limit: 0,
        priority_cutoff: PriorityCutoff::AllowNothing,
    };

    /// Creates a budget.
    #[must_use]
    pub const fn new(bytes_limit: u64, priority_cutoff: PriorityCutoff) -> Self {
        Self {
            bytes_limit,
            priority_cutoff,
        }
    }
}

/// OS-level memory pressure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemoryPressure {
    /// No pressure.
    #[default]
    None,
    /// The system would like memory back.
    Moderate,
    /// The system is about to start killing processes.
    Critical,
}

/// Budgets the embedder imposes on the compositor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MemoryPolicy {
    /// Budget while the compositor is visible.
    pub when_visible: MemoryBudget,
    /// Budget while it is hidden.
    pub when_not_visible: MemoryBudget,
    /// Maximum number of resident resources, regardless of size.
    pub num_resources_limit: usize,
}

/// Limits derived from a [`MemoryPolicy`] for the current visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TileMemoryLimits {
    /// Usage may never exceed this.
    pub hard_bytes: u64,
    /// Usage returns to this after going over.
    pub soft_bytes: u64,
    /// Least urgent content that may stay resident.
    pub cutoff: PriorityCutoff,
    /// Maximum number of resident resources.
    pub num_resources_limit: usize,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl MemoryPolicy {
    /// 64 MiB while visible, nothing while hidden.
    pub const DEFAULT: Self = Self {
        when_visible: MemoryBudget::new(64 * 1024 * 1024, PriorityCutoff::AllowEverything),
        when_not_visible: MemoryBudget::NOTHING,
        num_resources_limit: 10_000,
    };

    /// A policy that keeps nothing resident.
    pub const NOTHING: Self = Self {
        when_visible: MemoryBudget::NOTHING,
        when_not_visible: MemoryBudget::NOTHING,
        num_resources_limit: 0,
    };

    /// Creates a policy that only differs from [`DEFAULT`](Self::DEFAULT) in
    /// its visible byte limit.
    #[must_use]
    pub const fn with_visible_bytes(bytes_limit: u64) -> Self {
        let mut policy = Self::DEFAULT;
        policy.when_visible.bytes_limit = bytes_limit;
        policy
    }

    /// Returns the budget for the given visibility.
    #[must_use]
    pub const fn budget(&self, visible: bool) -> MemoryBudget {
        if visible {
            self.when_visible
        } else {
            self.when_not_visible
        }
    }

    /// Derives the limits the resource layer must respect.
    ///
    /// While visible, the soft limit is `prepaint_percent` of the hard
    /// limit; it is the level usage falls back to after prepainting pushed
    /// it higher. While hidden, both limits equal the hidden budget. A zero
    /// byte budget always yields [`PriorityCutoff::AllowNothing`].
    #[must_use]
    pub fn limits(&self, visible: bool, prepaint_percent: u8) -> TileMemoryLimits {
        let budget = self.budget(visible);
        let hard = budget.bytes_limit;
        let soft = if visible {
            hard / 100 * u64::from(prepaint_percent.min(100))
                + hard % 100 * u64::from(prepaint_percent.min(100)) / 100
        } else {
            hard
        };
        let cutoff = if hard == 0 {
            PriorityCutoff::AllowNothing
        } else {
            budget.priority_cutoff
        };
        TileMemoryLimits {
            hard_bytes: hard,
            soft_bytes: soft,
            cutoff,
            num_resources_limit: self.num_resources_limit,
        }
    }

    /// Returns a new policy reduced for the given pressure level.
    ///
    /// `self` is not modified.
    #[must_use]
    pub fn for_pressure(&self, pressure: MemoryPressure) -> Self {
        match pressure {
            MemoryPressure::None => *self,
            MemoryPressure::Moderate => Self {
                when_visible: MemoryBudget::new(
                    self.when_visible.bytes_limit / 2,
                    self.when_visible
                        .priority_cutoff
                        .min(PriorityCutoff::AllowNiceToHave),
                ),
                when_not_visible: MemoryBudget::NOTHING,
                num_resources_limit: self.num_resources_limit / 2,
            },
            MemoryPressure::Critical => Self {
                when_visible: MemoryBudget::new(
                    self.when_visible.bytes_limit / 4,
                    self.when_visible
                        .priority_cutoff
                        .min(PriorityCutoff::AllowRequiredOnly),
                ),
                when_not_visible: MemoryBudget::NOTHING,
                num_resources_limit: self.num_resources_limit / 4,
            },
        }
    }
}
