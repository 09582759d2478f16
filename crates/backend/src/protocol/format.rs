//! Human readable renderings of protocol values.

/// `0.6` as `60%`
pub fn percent(fraction: f64) -> String {
  format!("{}%", (fraction * 100.0).round() as i64)
}

/// Seconds as `12s`, `31min` or `2.3h`
pub fn duration(seconds: u64) -> String {
  if seconds < 60 {
    format!("{}s", seconds)
  } else if seconds < 60 * 60 {
    format!("{}min", seconds / 60)
  } else {
    format!("{:.1}h", seconds as f64 / 3600.0)
  }
}

/// Binary byte sizes: `512 B`, `289.0 MiB`, `3.1 GiB`
pub fn bytes(value: u64) -> String {
  const UNIT: u64 = 1024;
  const PREFIXES: &[char] = &['K', 'M', 'G', 'T', 'P', 'E'];

  if value < UNIT {
    return format!("{} B", value);
  }

  let mut div = UNIT;
  let mut exp = 0;
  let mut n = value / UNIT;
  while n >= UNIT && exp < PREFIXES.len() - 1 {
    div *= UNIT;
    exp += 1;
    n /= UNIT;
  }

  format!("{:.1} {}iB", value as f64 / div as f64, PREFIXES[exp])
}
