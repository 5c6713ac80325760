use chrono::{DateTime, Utc};

use super::super::domain::DeliveryContext;

/// Delay at which the timeliness score bottoms out.
pub const MAX_DELAY_HOURS: f64 = 4.0;

pub fn score(context: &DeliveryContext) -> f64 {
    score_between(context.promised_time(), context.delivered_time())
}

/// On-time or early deliveries score 1.0; late ones decay linearly to zero
/// at [`MAX_DELAY_HOURS`].
pub fn score_between(promised: DateTime<Utc>, delivered: DateTime<Utc>) -> f64 {
    if delivered <= promised {
        return 1.0;
    }

    let delay_hours = (delivered - promised).num_milliseconds() as f64 / 3_600_000.0;
    (1.0 - delay_hours.min(MAX_DELAY_HOURS) / MAX_DELAY_HOURS).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn promised() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-10T17:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    #[test]
    fn early_delivery_scores_full() {
        let delivered = promised() - Duration::minutes(15);
        assert_eq!(score_between(promised(), delivered), 1.0);
        assert_eq!(score_between(promised(), promised()), 1.0);
    }

    #[test]
    fn two_hours_late_scores_half() {
        let delivered = promised() + Duration::hours(2);
        assert!((score_between(promised(), delivered) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn decay_is_monotonic_and_floors_at_zero() {
        let mut previous = 1.0;
        for minutes in (0..=360).step_by(10) {
            let current = score_between(promised(), promised() + Duration::minutes(minutes));
            assert!(current <= previous);
            assert!((0.0..=1.0).contains(&current));
            previous = current;
        }
        assert_eq!(score_between(promised(), promised() + Duration::hours(4)), 0.0);
        assert_eq!(score_between(promised(), promised() + Duration::days(2)), 0.0);
    }
}
