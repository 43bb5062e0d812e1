use once_cell::sync::Lazy;
use regex::Regex;

/// Matches `COMK-TEST-<EVENT>` or `COMK-TEST-<EVENT> <text>` (spec §4.5).
static SENTINEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^COMK-TEST-([A-Z-]+)(?:\s+(.*))?$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseResult {
    pub title: String,
    pub total: u32,
    pub failed: u32,
}

/// Aggregates `add_testcase_result` calls into the process-level footer
/// (spec §A.3 supplemented "test-summary footer").
#[derive(Debug, Default)]
pub struct TestSummary {
    pub cases: Vec<TestCaseResult>,
}

impl TestSummary {
    pub fn add_testcase_result(&mut self, title: impl Into<String>, total: u32, failed: u32) {
        self.cases.push(TestCaseResult {
            title: title.into(),
            total,
            failed,
        });
    }

    pub fn total_cases(&self) -> usize {
        self.cases.len()
    }

    pub fn total_failed_cases(&self) -> usize {
        self.cases.iter().filter(|c| c.failed > 0).count()
    }

    pub fn total_assertions(&self) -> u32 {
        self.cases.iter().map(|c| c.total).sum()
    }

    pub fn total_failed_assertions(&self) -> u32 {
        self.cases.iter().map(|c| c.failed).sum()
    }
}

/// Incremental parser state for one `AbacladeTest` job's stderr stream.
#[derive(Debug, Default)]
pub struct AbacladeTestParser {
    current_title: Option<String>,
    total: u32,
    failed: u32,
    pub failure_notes: Vec<String>,
}

/// What handling one stderr line produced, if the case just closed.
pub enum SentinelEffect {
    None,
    CaseComplete(TestCaseResult),
}

impl AbacladeTestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line of stderr through the sentinel parser. Lines that
    /// don't match `COMK-TEST-*` are ignored by this parser (they still go
    /// to the per-target log as ordinary output).
    pub fn feed_line(&mut self, line: &str) -> SentinelEffect {
        let caps = match SENTINEL_RE.captures(line.trim_end()) {
            Some(c) => c,
            None => return SentinelEffect::None,
        };
        let event = caps.get(1).unwrap().as_str();
        let arg = caps.get(2).map(|m| m.as_str().to_string());

        match event {
            "CASE-START" => {
                self.current_title = arg;
                self.total = 0;
                self.failed = 0;
                SentinelEffect::None
            }
            "ASSERT-PASS" => {
                self.total += 1;
                SentinelEffect::None
            }
            "ASSERT-FAIL" => {
                self.total += 1;
                self.failed += 1;
                if let Some(text) = arg {
                    self.failure_notes.push(text);
                }
                SentinelEffect::None
            }
            "CASE-END" => {
                let title = self.current_title.take().unwrap_or_default();
                let result = TestCaseResult {
                    title,
                    total: self.total,
                    failed: self.failed,
                };
                self.total = 0;
                self.failed = 0;
                SentinelEffect::CaseComplete(result)
            }
            _ => SentinelEffect::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_case_accumulates_and_closes() {
        let mut parser = AbacladeTestParser::new();
        assert!(matches!(
            parser.feed_line("COMK-TEST-CASE-START x"),
            SentinelEffect::None
        ));
        parser.feed_line("COMK-TEST-ASSERT-PASS");
        parser.feed_line("COMK-TEST-ASSERT-FAIL boom");
        match parser.feed_line("COMK-TEST-CASE-END") {
            SentinelEffect::CaseComplete(result) => {
                assert_eq!(
                    result,
                    TestCaseResult {
                        title: "x".to_string(),
                        total: 2,
                        failed: 1,
                    }
                );
            }
            SentinelEffect::None => panic!("expected a completed case"),
        }
        assert_eq!(parser.failure_notes, vec!["boom".to_string()]);
    }

    #[test]
    fn non_sentinel_lines_are_ignored() {
        let mut parser = AbacladeTestParser::new();
        assert!(matches!(parser.feed_line("hello world"), SentinelEffect::None));
    }

    #[test]
    fn test_summary_aggregates_multiple_cases() {
        let mut summary = TestSummary::default();
        summary.add_testcase_result("a", 3, 0);
        summary.add_testcase_result("b", 2, 1);
        assert_eq!(summary.total_cases(), 2);
        assert_eq!(summary.total_failed_cases(), 1);
        assert_eq!(summary.total_assertions(), 5);
        assert_eq!(summary.total_failed_assertions(), 1);
    }
}
