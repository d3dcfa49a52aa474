use rand::RngCore;

/// Produces an opaque identifier of the form
/// `{prefix}_{unix_millis}_{20 hex chars}`.
///
/// The decimal timestamp gives coarse sortability; 10 bytes of OS randomness
/// make collisions negligible within a single fleet.
pub fn new_id(prefix: &str) -> String {
    let mut buf = [0u8; 10];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{}_{}_{}", prefix, millis, hex::encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_and_uniqueness() {
        let id = new_id("t");
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "t");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[2].len(), 20);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));

        assert_ne!(new_id("t"), new_id("t"));
    }

    #[test]
    fn timestamps_sort_coarsely() {
        let a = new_id("t");
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_id("t");
        let millis = |id: &str| id.split('_').nth(1).unwrap().parse::<i64>().unwrap();
        assert!(millis(&a) <= millis(&b));
    }
}
