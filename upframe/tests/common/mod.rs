//! Common test utilities and macros

use upframe::{CallInfo, Flow, FrameStack, Values, Want, origin};

#[derive(Debug)]
pub enum TestResult {
    Success,
    SuccessWithValue(Values),
    Error(String),
    ErrorRegex(String),
}

impl PartialEq for TestResult {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TestResult::Success, TestResult::Success) => true,
            (TestResult::SuccessWithValue(a), TestResult::SuccessWithValue(b)) => a == b,
            (TestResult::Error(a), TestResult::Error(b)) => a == b,
            (TestResult::ErrorRegex(pattern), TestResult::Error(msg)) => {
                regex::Regex::new(pattern).unwrap().is_match(msg)
            }
            (TestResult::Error(msg), TestResult::ErrorRegex(pattern)) => {
                regex::Regex::new(pattern).unwrap().is_match(msg)
            }
            _ => false,
        }
    }
}

/// Runs `body` as the body of a call made from the root frame and reports
/// what the caller received.
///
/// The stack must be back to its root frame afterwards, whatever happened.
pub fn run_in_call(want: Want, body: fn(&mut FrameStack) -> Flow<Values>) -> TestResult {
    let mut stack = FrameStack::new();
    let result = stack.call(CallInfo::new("main::scenario", want), origin!(), body);
    assert_eq!(stack.depth(), 1, "frames leaked: {:#?}", stack.backtrace());

    match result {
        Ok(values) if values.is_empty() => TestResult::Success,
        Ok(values) => TestResult::SuccessWithValue(values),
        Err(e) => TestResult::Error(e.to_string()),
    }
}

#[macro_export]
macro_rules! check_scenario {
    ($test_name:ident, want=$want:expr, body=$body:expr, result=$expected:expr) => {
        #[test]
        fn $test_name() {
            let result = crate::common::run_in_call($want, $body);
            assert_eq!(result, $expected);
        }
    };
}
