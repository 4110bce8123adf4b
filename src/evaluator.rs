// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mission grading.
//!
//! Turns a raw score and elapsed time into stars and a pass flag. Pure and
//! deterministic: the coordinator grades at sync time, so the same queued
//! entry always produces the same remote payload.
//!
//! # Example
//!
//! ```
//! use mission_sync::evaluate;
//!
//! let grade = evaluate(27, 30, 500);
//! assert_eq!(grade.stars, 3);
//! assert!(grade.passed);
//! assert!((grade.accuracy_percent - 90.0).abs() < 1e-9);
//! ```

use serde::Serialize;
use tracing::warn;

/// Fastest-tier time limit for three stars.
pub const THREE_STAR_TIME_LIMIT_SECS: u32 = 600;

/// Outcome of grading one mission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Grade {
    /// 0 to 3
    pub stars: u8,
    pub passed: bool,
    pub accuracy_percent: f64,
}

impl Grade {
    /// Returned when there is nothing to grade.
    pub const ZERO: Grade = Grade {
        stars: 0,
        passed: false,
        accuracy_percent: 0.0,
    };
}

/// Grade a mission.
///
/// Stars, first match wins:
/// - accuracy >= 90% within [`THREE_STAR_TIME_LIMIT_SECS`]: 3
/// - accuracy >= 80%: 2
/// - accuracy >= 70%: 1
///
/// `passed` requires accuracy strictly above 80%, so a mission at exactly
/// 80% earns two stars but does not pass.
///
/// `total == 0` yields [`Grade::ZERO`]. `correct > total` is clamped.
#[must_use]
pub fn evaluate(correct: u32, total: u32, elapsed_seconds: u32) -> Grade {
    if total == 0 {
        warn!(correct, elapsed_seconds, "Cannot grade mission with no questions");
        return Grade::ZERO;
    }

    let correct = if correct > total {
        warn!(correct, total, "Correct answers exceed total, clamping");
        total
    } else {
        correct
    };

    let accuracy_percent = 100.0 * f64::from(correct) / f64::from(total);

    let stars = if accuracy_percent >= 90.0 && elapsed_seconds <= THREE_STAR_TIME_LIMIT_SECS {
        3
    } else if accuracy_percent >= 80.0 {
        2
    } else if accuracy_percent >= 70.0 {
        1
    } else {
        0
    };

    Grade {
        stars,
        passed: accuracy_percent > 80.0,
        accuracy_percent,
    }
}
