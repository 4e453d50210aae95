//! Boot-time configuration surface.
//!
//! The firmware bridge may hand the kernel a small `key=value` blob (for
//! example, parsed from a UEFI loader's command line). Absence of a blob,
//! or of any particular key, falls back to compiled-in defaults.

#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    pub log_level: log::LevelFilter,
    pub quantum_ticks: u64,
    pub heap_pages: usize,
}

impl Default for BootConfig {
    fn default() -> Self {
        BootConfig {
            log_level: log::LevelFilter::Info,
            quantum_ticks: 1,
            heap_pages: 32,
        }
    }
}

impl BootConfig {
    /// Parse a newline-separated `key=value` blob. Malformed lines are
    /// skipped with a warning rather than rejected outright.
    pub fn parse(bytes: &[u8]) -> BootConfig {
        let mut cfg = BootConfig::default();
        let text = match core::str::from_utf8(bytes) {
            Ok(t) => t,
            Err(_) => {
                log::warn!("boot config blob is not valid UTF-8; using defaults");
                return cfg;
            }
        };

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::warn!("ignoring malformed boot config line: {line:?}");
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "log_level" => match value.parse() {
                    Ok(level) => cfg.log_level = level,
                    Err(_) => log::warn!("ignoring unrecognized log_level {value:?}"),
                },
                "quantum_ticks" => match value.parse() {
                    Ok(n) => cfg.quantum_ticks = n,
                    Err(_) => log::warn!("ignoring unrecognized quantum_ticks {value:?}"),
                },
                "heap_pages" => match value.parse() {
                    Ok(n) => cfg.heap_pages = n,
                    Err(_) => log::warn!("ignoring unrecognized heap_pages {value:?}"),
                },
                other => log::warn!("ignoring unknown boot config key {other:?}"),
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_on_empty_blob() {
        let cfg = BootConfig::parse(b"");
        assert_eq!(cfg.heap_pages, 32);
        assert_eq!(cfg.quantum_ticks, 1);
    }

    #[test]
    fn parses_known_keys() {
        let cfg = BootConfig::parse(b"log_level=debug\nheap_pages=64\nquantum_ticks=4\n");
        assert_eq!(cfg.log_level, log::LevelFilter::Debug);
        assert_eq!(cfg.heap_pages, 64);
        assert_eq!(cfg.quantum_ticks, 4);
    }

    #[test]
    fn skips_malformed_lines() {
        let cfg = BootConfig::parse(b"not-a-kv-pair\nheap_pages=48\n");
        assert_eq!(cfg.heap_pages, 48);
    }
}
