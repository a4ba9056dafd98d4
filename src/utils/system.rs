pub fn software_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Worker threads to use by default: all logical cores but two, at least one.
pub fn core_count() -> usize {
    let n = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    n.saturating_sub(2).max(1)
}

pub fn unix_time_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
