/// Runtime statistics kept per tracked process.
///
/// Minimum fields start at the largest representable value and maximum fields
/// at the smallest, so the first recorded sample always replaces both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedStats {
    /// Last cumulative on-cpu time read for the task, in nanoseconds.
    pub rt_total: u64,
    pub rt_min: i64,
    pub rt_avg: i64,
    pub rt_max: i64,
    /// Timestamp of the last sample, in nanoseconds.
    pub last_ts: u64,
    /// Number of samples recorded.
    pub dl_count: u64,
    /// Samples that could not be taken.
    pub dl_scanfail: u64,
    /// Samples exceeding the configured runtime budget.
    pub dl_overrun: u64,
    pub dl_diff_min: i64,
    pub dl_diff_avg: i64,
    pub dl_diff_max: i64,
}

impl Default for SchedStats {
    fn default() -> Self {
        Self {
            rt_total: 0,
            rt_min: i64::MAX,
            rt_avg: 0,
            rt_max: i64::MIN,
            last_ts: 0,
            dl_count: 0,
            dl_scanfail: 0,
            dl_overrun: 0,
            dl_diff_min: i64::MAX,
            dl_diff_avg: 0,
            dl_diff_max: i64::MIN,
        }
    }
}

impl SchedStats {
    /// Returns `true` while no sample has been recorded.
    pub fn is_empty(&self) -> bool {
        self.dl_count == 0
    }

    /// Records one runtime sample (nanoseconds spent on cpu during a period).
    ///
    /// The average is smoothed with a weight of 1/10 per new sample. A non-zero
    /// `budget` counts samples above it as overruns.
    pub fn record_runtime(&mut self, sample: i64, budget: u64) {
        self.rt_min = self.rt_min.min(sample);
        self.rt_max = self.rt_max.max(sample);
        self.rt_avg = if self.dl_count == 0 {
            sample
        } else {
            (self.rt_avg.saturating_mul(9).saturating_add(sample)) / 10
        };

        if budget > 0 {
            let diff = i64::try_from(budget).unwrap_or(i64::MAX).saturating_sub(sample);
            self.dl_diff_min = self.dl_diff_min.min(diff);
            self.dl_diff_max = self.dl_diff_max.max(diff);
            self.dl_diff_avg = if self.dl_count == 0 {
                diff
            } else {
                (self.dl_diff_avg.saturating_mul(9).saturating_add(diff)) / 10
            };
            if diff < 0 {
                self.dl_overrun += 1;
            }
        }
        self.dl_count += 1;
    }

    /// Feeds a cumulative on-cpu reading and records the delta since the last one.
    ///
    /// The first reading only establishes the baseline. A counter that went
    /// backwards (pid reuse) resets the baseline as well.
    pub fn update_runtime(&mut self, total_ns: u64, timestamp: u64, budget: u64) {
        let previous = self.rt_total;
        self.rt_total = total_ns;
        self.last_ts = timestamp;
        if previous == 0 || total_ns < previous {
            return;
        }
        let delta = i64::try_from(total_ns - previous).unwrap_or(i64::MAX);
        self.record_runtime(delta, budget);
    }

    /// Counts a failed sample.
    pub fn record_failure(&mut self) {
        self.dl_scanfail += 1;
    }
}
