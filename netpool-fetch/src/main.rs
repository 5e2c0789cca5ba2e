/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use clap_complete::Shell;
use url::Url;

mod config;
mod context;
mod logger;

mod cmd_del;
mod cmd_get;
mod cmd_head;
mod cmd_list;
mod cmd_put;
mod cmd_stat;

use config::FetchConfig;
use context::FetchContext;

const GLOBAL_ARG_COMPLETION: &str = "completion";
const GLOBAL_ARG_CONFIG: &str = "config";
const GLOBAL_ARG_PROXY: &str = "proxy";
const GLOBAL_ARG_USERNAME: &str = "user";
const GLOBAL_ARG_PASSWORD: &str = "password";
const GLOBAL_ARG_TRACE: &str = "trace";
const GLOBAL_ARG_VERBOSE: &str = "verbose";

fn build_cli_args() -> Command {
    Command::new("netpool-fetch")
        .arg(
            Arg::new(GLOBAL_ARG_COMPLETION)
                .num_args(1)
                .value_name("SHELL")
                .long("completion")
                .value_parser(value_parser!(Shell))
                .exclusive(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_CONFIG)
                .help("YAML config file")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_parser(value_parser!(PathBuf))
                .short('c')
                .long("config")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_PROXY)
                .help("HTTP proxy for http and https urls")
                .num_args(1)
                .value_name("PROXY URL")
                .value_parser(value_parser!(Url))
                .short('x')
                .long("proxy")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_USERNAME)
                .help("Username for the target server")
                .num_args(1)
                .value_name("USERNAME")
                .short('u')
                .long("user")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_PASSWORD)
                .help("Password for the target server")
                .num_args(1)
                .value_name("PASSWORD")
                .short('p')
                .long("password")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_TRACE)
                .help("Log every protocol line, needs -vv to show")
                .action(ArgAction::SetTrue)
                .long("trace")
                .global(true),
        )
        .arg(
            Arg::new(GLOBAL_ARG_VERBOSE)
                .help("Show verbose message")
                .num_args(0)
                .action(ArgAction::Count)
                .short('v')
                .global(true),
        )
        .subcommand(cmd_get::command())
        .subcommand(cmd_head::command())
        .subcommand(cmd_put::command())
        .subcommand(cmd_list::command())
        .subcommand(cmd_stat::command())
        .subcommand(cmd_del::command())
}

fn build_context(args: &ArgMatches) -> anyhow::Result<FetchContext> {
    let mut config = match args.get_one::<PathBuf>(GLOBAL_ARG_CONFIG) {
        Some(path) => FetchConfig::load(path)?,
        None => FetchConfig::default(),
    };
    if args.get_flag(GLOBAL_ARG_TRACE) {
        config.http.trace_connections = true;
        config.ftp.trace_connections = true;
    }

    let credentials = context::credentials(
        args.get_one::<String>(GLOBAL_ARG_USERNAME).map(|s| s.as_str()),
        args.get_one::<String>(GLOBAL_ARG_PASSWORD).map(|s| s.as_str()),
    )?;
    let proxy = args.get_one::<Url>(GLOBAL_ARG_PROXY).cloned();
    FetchContext::new(config, proxy, credentials)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = build_cli_args().get_matches();

    if let Some(target) = args.get_one::<Shell>(GLOBAL_ARG_COMPLETION) {
        let mut app = build_cli_args();
        let bin_name = app.get_name().to_string();
        clap_complete::generate(*target, &mut app, bin_name, &mut io::stdout());
        return Ok(());
    }

    let verbose_level = args
        .get_one::<u8>(GLOBAL_ARG_VERBOSE)
        .copied()
        .unwrap_or_default();
    let logger = logger::SyncLogger::new(verbose_level);
    logger.into_global_logger().context("failed to setup logger")?;

    let Some((subcommand, sub_args)) = args.subcommand() else {
        return Err(anyhow!("no subcommand found"));
    };
    let ctx = build_context(&args)?;

    match subcommand {
        cmd_get::COMMAND => cmd_get::run(&ctx, sub_args).await,
        cmd_head::COMMAND => cmd_head::run(&ctx, sub_args).await,
        cmd_put::COMMAND => cmd_put::run(&ctx, sub_args).await,
        cmd_list::COMMAND => cmd_list::run(&ctx, sub_args).await,
        cmd_stat::COMMAND => cmd_stat::run(&ctx, sub_args).await,
        cmd_del::COMMAND => cmd_del::run(&ctx, sub_args).await,
        cmd => Err(anyhow!("invalid subcommand {cmd}")),
    }
}
