//! Command-line parsing.

use anyhow::{anyhow, bail, Context};
use prism_app::AppConfig;
use std::str::FromStr;

/// What the binary was asked to do.
#[derive(Debug)]
pub enum Command {
    Run(AppConfig),
    Help,
}

/// Parse arguments (without the program name) on top of `defaults`.
pub fn parse_args<I>(args: I, defaults: AppConfig) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut config = defaults;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--width" => config.width = value(&arg, args.next())?,
            "--height" => config.height = value(&arg, args.next())?,
            "--validation" => config = config.with_validation(true),
            "--no-validation" => config = config.with_validation(false),
            "--vertex-shader" => {
                config.shaders.vertex = required(&arg, args.next())?.into();
            }
            "--fragment-shader" => {
                config.shaders.fragment = required(&arg, args.next())?.into();
            }
            "--max-frames" => {
                let max_frames: u64 = value(&arg, args.next())?;
                if max_frames == 0 {
                    bail!("--max-frames must be at least 1");
                }
                config = config.with_max_frames(max_frames);
            }
            other => bail!("Unknown argument '{other}' (see --help)"),
        }
    }

    if config.width == 0 || config.height == 0 {
        bail!("Window size must be nonzero, got {}x{}", config.width, config.height);
    }

    Ok(Command::Run(config))
}

fn required(flag: &str, value: Option<String>) -> anyhow::Result<String> {
    value.ok_or_else(|| anyhow!("{flag} requires a value"))
}

fn value<T>(flag: &str, value: Option<String>) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = required(flag, value)?;
    raw.parse()
        .with_context(|| format!("Invalid value '{raw}' for {flag}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_app::{ShaderPaths, Validation};

    fn parse(args: &[&str]) -> anyhow::Result<Command> {
        parse_args(args.iter().map(ToString::to_string), AppConfig::default())
    }

    fn run_config(args: &[&str]) -> AppConfig {
        match parse(args).unwrap() {
            Command::Run(config) => config,
            Command::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn no_arguments_keeps_defaults() {
        let config = run_config(&[]);
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.max_frames, None);
    }

    #[test]
    fn all_flags() {
        let config = run_config(&[
            "--width",
            "1024",
            "--height",
            "768",
            "--no-validation",
            "--vertex-shader",
            "v.spv",
            "--fragment-shader",
            "f.spv",
            "--max-frames",
            "120",
        ]);

        assert_eq!((config.width, config.height), (1024, 768));
        assert_eq!(config.gpu.validation, Validation::Disabled);
        assert_eq!(config.shaders, ShaderPaths::new("v.spv", "f.spv"));
        assert_eq!(config.max_frames, Some(120));
    }

    #[test]
    fn last_validation_flag_wins() {
        let config = run_config(&["--no-validation", "--validation"]);
        assert_eq!(config.gpu.validation, Validation::Enabled);
    }

    #[test]
    fn help_short_circuits() {
        assert!(matches!(parse(&["--width", "10", "-h", "--bogus"]), Ok(Command::Help)));
        assert!(matches!(parse(&["--help"]), Ok(Command::Help)));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--width"]).is_err());
        assert!(parse(&["--width", "wide"]).is_err());
        assert!(parse(&["--max-frames", "-1"]).is_err());
        assert!(parse(&["--height", "0"]).is_err());
        assert!(parse(&["--fullscreen"]).is_err());
    }

    #[test]
    fn zero_max_frames_rejected() {
        let err = parse(&["--max-frames", "0"]).unwrap_err();
        assert!(format!("{err:#}").contains("--max-frames"));
        assert_eq!(run_config(&["--max-frames", "1"]).max_frames, Some(1));
    }

    #[test]
    fn error_names_the_flag() {
        let err = parse(&["--height", "tall"]).unwrap_err();
        assert!(format!("{err:#}").contains("--height"));
    }
}
