//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(
    name = "upqueue-cli",
    version,
    about = "Upload files and directories through a bounded upload queue"
)]
pub struct Cli {
    /// Files or directories to upload. Directories are walked recursively.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Upload endpoint.
    #[arg(long, env = "UPQUEUE_URL")]
    pub url: Option<String>,

    /// Configuration file (TOML).
    #[arg(long, env = "UPQUEUE_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP method used for each upload.
    #[arg(long)]
    pub method: Option<String>,

    /// Maximum concurrent uploads; 0 means unlimited.
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Milliseconds between admission bursts.
    #[arg(long)]
    pub batch_offset_ms: Option<u64>,

    /// Largest accepted file in MiB.
    #[arg(long)]
    pub max_file_size: Option<u64>,

    /// Accepted extensions, comma separated (e.g. `.jpg,.png`).
    #[arg(long)]
    pub accept: Option<String>,

    /// Reject files whose extension is not listed in `--accept`.
    #[arg(long)]
    pub validate_extension: bool,

    /// Upload zero-byte files instead of rejecting them.
    #[arg(long)]
    pub allow_empty: bool,

    /// Extra request header, `NAME=VALUE`. May be repeated.
    #[arg(long = "header", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Extra form field, `NAME=VALUE`. May be repeated.
    #[arg(long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,
}

impl Cli {
    /// Applies command-line overrides on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(method) = &self.method {
            config.method = method.clone();
        }
        if let Some(max_parallel) = self.max_parallel {
            config.queue.max_parallel = max_parallel;
        }
        if let Some(ms) = self.batch_offset_ms {
            config.queue.batch_offset_ms = ms;
        }
        if let Some(max_file_size) = self.max_file_size {
            config.area.max_file_size = max_file_size;
        }
        if let Some(accept) = &self.accept {
            config.area.accept = accept.clone();
        }
        config.area.validate_extension |= self.validate_extension;
        config.area.allow_empty_file |= self.allow_empty;
        config.headers.extend(self.headers.iter().cloned());
        config.params.extend(self.params.iter().cloned());
        config.queue.auto_start = true;
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    if key.trim().is_empty() {
        return Err(format!("empty name in `{s}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_config() {
        let cli = Cli::parse_from([
            "upqueue-cli",
            "--url",
            "https://cli.example",
            "--max-parallel",
            "7",
            "--batch-offset-ms",
            "150",
            "--accept",
            ".png",
            "--validate-extension",
            "--header",
            "X-Token=abc",
            "--param",
            "album=trip",
            "photos",
        ]);
        let mut config = Config {
            url: "https://file.example".into(),
            ..Config::default()
        };
        config.queue.auto_start = false;
        cli.apply(&mut config);

        assert_eq!(config.url, "https://cli.example");
        assert_eq!(config.queue.max_parallel, 7);
        assert_eq!(config.queue.batch_offset_ms, 150);
        assert!(config.queue.auto_start);
        assert_eq!(config.area.accept, ".png");
        assert!(config.area.validate_extension);
        assert_eq!(config.headers["X-Token"], "abc");
        assert_eq!(config.params["album"], "trip");
        assert_eq!(cli.paths, vec![PathBuf::from("photos")]);
    }

    #[test]
    fn unset_flags_keep_config_values() {
        let cli = Cli::parse_from(["upqueue-cli", "a.txt"]);
        let mut config = Config {
            method: "PUT".into(),
            ..Config::default()
        };
        cli.apply(&mut config);
        assert_eq!(config.method, "PUT");
        assert_eq!(config.queue.max_parallel, 4);
        assert!(!config.area.allow_empty_file);
    }

    #[test]
    fn key_value_parsing() {
        assert_eq!(
            parse_key_value("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn paths_are_required() {
        assert!(Cli::try_parse_from(["upqueue-cli"]).is_err());
    }
}
