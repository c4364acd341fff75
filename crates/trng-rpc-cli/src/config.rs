use anyhow::bail;
use clap::{Parser, Subcommand};
use core::time::Duration;
use trng_rpc::{ClientConfig, DEFAULT_ENDPOINT};

/// Largest number of values the service returns for one request.
const MAX_N: u32 = 10_000;

/// Command line configuration for the `trng-rpc` binary.
///
/// Every flag can also be set through the environment (or a `.env` file).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "trng-rpc",
    version,
    about = "Paced, quota-aware client for a JSON-RPC true random number service"
)]
pub struct CliArgs {
    /// Identity (API key) sent with every request.
    ///
    /// Environment variable: `TRNG_API_KEY`
    #[arg(long, env = "TRNG_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// JSON-RPC endpoint of the service.
    ///
    /// Environment variable: `TRNG_ENDPOINT`
    #[arg(long, env = "TRNG_ENDPOINT", default_value_t = String::from(DEFAULT_ENDPOINT))]
    pub endpoint: String,

    /// Seconds a request may wait before being sent. Negative waits without
    /// limit.
    ///
    /// Environment variable: `TRNG_BLOCKING_TIMEOUT`
    #[arg(long, env = "TRNG_BLOCKING_TIMEOUT", default_value_t = 86_400.0, allow_negative_numbers = true)]
    pub blocking_timeout: f64,

    /// Network timeout of one exchange, in seconds.
    ///
    /// Environment variable: `TRNG_HTTP_TIMEOUT`
    #[arg(long, env = "TRNG_HTTP_TIMEOUT", default_value_t = 120.0)]
    pub http_timeout: f64,

    /// Let concurrent requests overlap instead of queueing them.
    ///
    /// Environment variable: `TRNG_UNSERIALIZED`
    #[arg(long, env = "TRNG_UNSERIALIZED", default_value_t = false)]
    pub unserialized: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Draw random integers.
    Integers {
        #[arg(short, long, default_value_t = 1)]
        n: u32,
        #[arg(long, allow_negative_numbers = true)]
        min: i64,
        #[arg(long, allow_negative_numbers = true)]
        max: i64,
        /// Draw without replacement (all values distinct).
        #[arg(long, default_value_t = false)]
        unique: bool,
        /// Base of the printed values: 2, 8, 10 or 16.
        #[arg(long, default_value_t = 10)]
        base: u32,
    },
    /// Draw decimal fractions in [0, 1).
    Decimals {
        #[arg(short, long, default_value_t = 1)]
        n: u32,
        #[arg(long, default_value_t = 4)]
        places: u32,
    },
    /// Draw random strings.
    Strings {
        #[arg(short, long, default_value_t = 1)]
        n: u32,
        #[arg(long, default_value_t = 8)]
        length: u32,
        #[arg(long, default_value_t = String::from("abcdefghijklmnopqrstuvwxyz"))]
        characters: String,
    },
    /// Draw version 4 UUIDs.
    Uuids {
        #[arg(short, long, default_value_t = 1)]
        n: u32,
    },
    /// Show the remaining daily allowance.
    Usage,
    /// Keep a cache of integer sets warm and take some sets from it.
    Cache {
        /// Integers per set.
        #[arg(short, long, default_value_t = 1)]
        n: u32,
        #[arg(long, allow_negative_numbers = true)]
        min: i64,
        #[arg(long, allow_negative_numbers = true)]
        max: i64,
        /// Sets the cache tries to keep ready.
        #[arg(long, default_value_t = 20)]
        capacity: usize,
        /// Sets to take before exiting.
        #[arg(long, default_value_t = 10)]
        take: usize,
        /// Seconds to wait for the sets before giving up.
        #[arg(long, default_value_t = 60.0)]
        max_wait: f64,
    },
}

/// Validated settings derived from [`CliArgs`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub endpoint: String,
    pub client: ClientConfig,
    pub command: Command,
}

impl TryFrom<CliArgs> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.api_key.trim().is_empty() {
            bail!("TRNG_API_KEY must not be empty");
        }

        let blocking_timeout = if args.blocking_timeout < 0.0 {
            None
        } else {
            Some(seconds("TRNG_BLOCKING_TIMEOUT", args.blocking_timeout)?)
        };
        let http_timeout = seconds("TRNG_HTTP_TIMEOUT", args.http_timeout)?;
        if http_timeout.is_zero() {
            bail!("TRNG_HTTP_TIMEOUT must be greater than 0");
        }

        validate_command(&args.command)?;

        let client = ClientConfig::default()
            .blocking_timeout(blocking_timeout)
            .http_timeout(http_timeout)
            .serialized(!args.unserialized);

        Ok(Self {
            api_key: args.api_key,
            endpoint: args.endpoint,
            client,
            command: args.command,
        })
    }
}

pub(crate) fn seconds(name: &str, value: f64) -> anyhow::Result<Duration> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) => Ok(duration),
        Err(_) => bail!("{name} must be a finite, non-negative number of seconds, got {value}"),
    }
}

fn count(n: u32) -> anyhow::Result<()> {
    if n == 0 || n > MAX_N {
        bail!("n must be within [1, {MAX_N}], got {n}");
    }
    Ok(())
}

fn range(min: i64, max: i64) -> anyhow::Result<()> {
    if min > max {
        bail!("min ({min}) must not exceed max ({max})");
    }
    Ok(())
}

fn validate_command(command: &Command) -> anyhow::Result<()> {
    match command {
        Command::Integers {
            n, min, max, base, ..
        } => {
            count(*n)?;
            range(*min, *max)?;
            if ![2, 8, 10, 16].contains(base) {
                bail!("base must be one of 2, 8, 10 or 16, got {base}");
            }
        }
        Command::Decimals { n, places } => {
            count(*n)?;
            if !(1..=14).contains(places) {
                bail!("places must be within [1, 14], got {places}");
            }
        }
        Command::Strings {
            n,
            length,
            characters,
        } => {
            count(*n)?;
            if !(1..=32).contains(length) {
                bail!("length must be within [1, 32], got {length}");
            }
            if characters.is_empty() {
                bail!("characters must not be empty");
            }
        }
        Command::Uuids { n } => count(*n)?,
        Command::Usage => {}
        Command::Cache {
            n,
            min,
            max,
            take,
            max_wait,
            ..
        } => {
            count(*n)?;
            range(*min, *max)?;
            if *take == 0 {
                bail!("take must be greater than 0");
            }
            seconds("max-wait", *max_wait)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Settings> {
        let mut argv = vec!["trng-rpc", "--api-key", "test-key"];
        argv.extend_from_slice(args);
        Settings::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn defaults_follow_client_config() {
        let settings = parse(&["usage"]).unwrap();
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.client, ClientConfig::default());
        assert_eq!(settings.command, Command::Usage);
    }

    #[test]
    fn negative_blocking_timeout_is_unbounded() {
        let settings = parse(&["--blocking-timeout", "-1", "usage"]).unwrap();
        assert_eq!(settings.client.blocking_timeout, None);

        let settings = parse(&["--blocking-timeout", "2.5", "usage"]).unwrap();
        assert_eq!(
            settings.client.blocking_timeout,
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn unserialized_flag_switches_dispatch() {
        let settings = parse(&["--unserialized", "usage"]).unwrap();
        assert!(!settings.client.serialized);
    }

    #[test]
    fn rejects_invalid_timeouts() {
        assert!(parse(&["--http-timeout", "0", "usage"]).is_err());
        assert!(parse(&["--http-timeout", "-3", "usage"]).is_err());
        assert!(parse(&["--blocking-timeout", "inf", "usage"]).is_err());
    }

    #[test]
    fn rejects_empty_identity() {
        let args = CliArgs::try_parse_from(["trng-rpc", "--api-key", " ", "usage"]).unwrap();
        assert!(Settings::try_from(args).is_err());
    }

    #[test]
    fn validates_integer_requests() {
        let settings = parse(&["integers", "-n", "6", "--min", "-10", "--max", "10"]).unwrap();
        assert_eq!(
            settings.command,
            Command::Integers {
                n: 6,
                min: -10,
                max: 10,
                unique: false,
                base: 10
            }
        );

        assert!(parse(&["integers", "--min", "5", "--max", "1"]).is_err());
        assert!(parse(&["integers", "-n", "0", "--min", "1", "--max", "6"]).is_err());
        assert!(parse(&["integers", "-n", "10001", "--min", "1", "--max", "6"]).is_err());
        assert!(parse(&["integers", "--min", "1", "--max", "6", "--base", "7"]).is_err());
    }

    #[test]
    fn validates_other_commands() {
        assert!(parse(&["decimals", "--places", "15"]).is_err());
        assert!(parse(&["strings", "--length", "0"]).is_err());
        assert!(parse(&["strings", "--characters", ""]).is_err());
        assert!(parse(&["uuids", "-n", "3"]).is_ok());
        assert!(parse(&["cache", "--min", "1", "--max", "6", "--take", "0"]).is_err());
        assert!(parse(&["cache", "--min", "1", "--max", "6", "--max-wait", "-1"]).is_err());
    }
}
