use complemake_job::TestSummary;

/// The outcome of one `build` invocation (spec §6 "Exit code: 0 iff all
/// requested targets built successfully"; §A.3 test-summary footer).
#[derive(Debug, Default)]
pub struct BuildReport {
    pub succeeded: bool,
    pub failed_jobs: usize,
    pub test_summary: TestSummary,
}

impl BuildReport {
    /// `"N cases, F failed; A assertions, FA failed"`, printed once after the
    /// build completes (spec §7: "test summaries at the end report
    /// total/passed/failed counts for both assertions and test cases").
    pub fn footer(&self) -> String {
        format!(
            "{} test case(s), {} failed; {} assertion(s), {} failed",
            self.test_summary.total_cases(),
            self.test_summary.total_failed_cases(),
            self.test_summary.total_assertions(),
            self.test_summary.total_failed_assertions(),
        )
    }
}
