use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_REPORT_INTERVAL_SECONDS: u64 = 5;

#[derive(Debug)]
pub struct AppConfig {
    pub root: PathBuf,
    pub report_interval: Duration,
    pub levels_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        if args.len() < 2 {
            return Err("usage: blitz <data-root> [report_interval_secs]".to_string());
        }

        let root = Path::new(&args[1]).to_path_buf();
        let report_interval_seconds = if args.len() > 2 {
            parse_interval(&args[2])
        } else {
            std::env::var("BLITZ_REPORT_SECS")
                .ok()
                .map(|value| parse_interval(&value))
                .unwrap_or(DEFAULT_REPORT_INTERVAL_SECONDS)
        };
        let levels_file = std::env::var("BLITZ_LEVELS_FILE").ok().and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(PathBuf::from(trimmed))
            }
        });
        Ok(Self {
            root,
            report_interval: Duration::from_secs(report_interval_seconds),
            levels_file,
        })
    }
}

fn parse_interval(value: &str) -> u64 {
    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => parsed,
        _ => {
            eprintln!(
                "blitz: invalid report interval '{}', using {}s",
                value, DEFAULT_REPORT_INTERVAL_SECONDS
            );
            DEFAULT_REPORT_INTERVAL_SECONDS
        }
    }
}
