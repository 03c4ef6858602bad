//! Green-time allocation policy.
//!
//! The GO duration for a pair is a step function of the larger of its two
//! approach counts, sampled when service begins. Sizing by the busier single
//! approach rather than the pair total is intentional.

/// One step of the allocation table: counts at or above `min_count` get `green_ms`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AllocationStep {
    pub min_count: u16,
    pub green_ms: u32,
}

impl AllocationStep {
    #[must_use]
    pub const fn new(min_count: u16, green_ms: u32) -> Self {
        Self {
            min_count,
            green_ms,
        }
    }
}

/// Step-function policy mapping demand to GO duration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AllocationPolicy {
    /// Duration when no step matches.
    pub base_ms: u32,
    /// Steps ordered by ascending `min_count` and non-decreasing `green_ms`.
    pub steps: [AllocationStep; 2],
}

impl AllocationPolicy {
    /// 2 s for light demand, 3 s for two vehicles, 5 s for three or more.
    pub const DEFAULT: AllocationPolicy = AllocationPolicy {
        base_ms: 2_000,
        steps: [AllocationStep::new(2, 3_000), AllocationStep::new(3, 5_000)],
    };

    /// GO duration in milliseconds for a demand of `vehicles`.
    #[must_use]
    pub fn allocate(&self, vehicles: u16) -> u32 {
        self.steps
            .iter()
            .rev()
            .find(|step| vehicles >= step.min_count)
            .map_or(self.base_ms, |step| step.green_ms)
    }

    /// GO duration for a pair given both of its approach counts.
    #[must_use]
    pub fn green_time_for(&self, counts: [u16; 2]) -> u32 {
        self.allocate(counts[0].max(counts[1]))
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
