//! Unit tests for debug.rs

use super::*;

#[test]
fn test_bucket_picks_highest_severity() {
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;
    assert_eq!(bucket(S::ERROR | S::WARNING), (0, LogSeverity::Error));
    assert_eq!(bucket(S::WARNING), (1, LogSeverity::Warn));
    assert_eq!(bucket(S::INFO), (2, LogSeverity::Info));
    assert_eq!(bucket(S::VERBOSE), (3, LogSeverity::Debug));
}

#[test]
fn test_stats_total() {
    let stats = ValidationStats { errors: 1, warnings: 2, info: 3, verbose: 4 };
    assert_eq!(stats.total(), 10);
}
