// src/cli.rs
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub const USAGE: &str = "\
usage: temperature-collector [serve] [--config <path>]
       temperature-collector healthcheck [--url <url>] [--config <path>]
       temperature-collector print-config [--config <path>]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Healthcheck { url: Option<String> },
    PrintConfig,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub command: Command,
    pub config_path: Option<PathBuf>,
}

impl Args {
    /// Parse everything after the program name.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into).peekable();

        let mut command = match args.peek().map(String::as_str) {
            Some("serve") => {
                args.next();
                Command::Serve
            }
            Some("healthcheck") => {
                args.next();
                Command::Healthcheck { url: None }
            }
            Some("print-config") => {
                args.next();
                Command::PrintConfig
            }
            _ => Command::Serve,
        };
        let mut config_path = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    let value = args.next().context("--config requires a path")?;
                    config_path = Some(PathBuf::from(value));
                }
                "--url" => {
                    let value = args.next().context("--url requires a value")?;
                    match &mut command {
                        Command::Healthcheck { url } => *url = Some(value),
                        _ => bail!("--url is only valid for healthcheck"),
                    }
                }
                "-h" | "--help" => command = Command::Help,
                other => bail!("unexpected argument {other:?}\n{USAGE}"),
            }
        }

        Ok(Self {
            command,
            config_path,
        })
    }
}
