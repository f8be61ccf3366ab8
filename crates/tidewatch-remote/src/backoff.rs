use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Exponential backoff with base 5s, factor 3 (5, 15, 45, ...), each
/// perturbed by +/-20% uniform jitter.
pub fn compute_backoff(attempt: u32) -> Duration {
    let base_secs: f64 = 5.0;
    let factor: f64 = 3.0;
    let unjittered = base_secs * factor.powi(attempt as i32);

    let jitter_fraction = rand::thread_rng().gen_range(-0.2..=0.2);
    let jittered = (unjittered * (1.0 + jitter_fraction)).max(0.0);

    Duration::from_secs_f64(jittered)
}

/// Honors a server-provided `Retry-After` by taking the larger of the
/// locally computed delay and the server's requested delay.
pub fn honor_retry_after(computed: Duration, retry_after: Option<Duration>) -> Duration {
    match retry_after {
        Some(server) if server > computed => server,
        _ => computed,
    }
}

/// Parses a `Retry-After` header value: either a delta-seconds integer or an
/// HTTP-date. A date in the past yields a zero delay rather than `None`, so
/// a server that just missed the deadline still gets an immediate retry.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let target = DateTime::parse_from_rfc2822(trimmed).ok()?.with_timezone(&Utc);
    Some((target - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_by_factor_three_before_jitter() {
        // can't assert exact values because of jitter, but the envelope
        // around attempt 0..2 should roughly track 5, 15, 45.
        for _ in 0..20 {
            let d0 = compute_backoff(0).as_secs_f64();
            assert!((4.0..=6.0).contains(&d0), "{d0}");
            let d1 = compute_backoff(1).as_secs_f64();
            assert!((12.0..=18.0).contains(&d1), "{d1}");
        }
    }

    #[test]
    fn retry_after_wins_when_larger() {
        let computed = Duration::from_secs(5);
        let server = Duration::from_secs(30);
        assert_eq!(honor_retry_after(computed, Some(server)), server);
    }

    #[test]
    fn computed_wins_when_retry_after_is_smaller() {
        let computed = Duration::from_secs(30);
        let server = Duration::from_secs(5);
        assert_eq!(honor_retry_after(computed, Some(server)), computed);
    }

    #[test]
    fn parses_delta_seconds_form() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("not-a-number"), None);
    }

    #[test]
    fn parses_http_date_form() {
        let future = Utc::now() + chrono::Duration::seconds(60);
        let header = future.to_rfc2822();
        let parsed = parse_retry_after(&header).expect("http-date should parse");
        assert!((55..=60).contains(&parsed.as_secs()), "{}", parsed.as_secs());
    }

    #[test]
    fn past_http_date_yields_zero_delay() {
        let past = Utc::now() - chrono::Duration::seconds(60);
        assert_eq!(parse_retry_after(&past.to_rfc2822()), Some(Duration::ZERO));
    }
}
