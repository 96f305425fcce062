use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of the random suffix of generated order ids.
const SUFFIX_LEN: usize = 6;

/// Generate a server-side order id: `{prefix}{unix_millis}{random suffix}`.
///
/// Collisions are unlikely but possible; the primary key constraint is
/// what makes ids unique, and the writer regenerates on conflict.
pub fn generate_order_id(prefix: &str, now: time::OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    format!("{prefix}{millis}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let now = time::OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap();
        let id = generate_order_id("BK", now);
        assert!(id.starts_with("BK1760000000000"));
        assert_eq!(id.len(), 2 + 13 + SUFFIX_LEN);
        assert!(id[15..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_ids_differ() {
        let now = time::OffsetDateTime::now_utc();
        let a = generate_order_id("BK", now);
        let b = generate_order_id("BK", now);
        assert_ne!(a, b);
    }
}
