/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgMatches, Command, value_parser};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::context::{FetchContext, Target};

pub(super) const COMMAND: &str = "get";

const COMMAND_ARG_URL: &str = "url";
const COMMAND_ARG_OUTPUT: &str = "output";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Download a file")
        .arg(
            Arg::new(COMMAND_ARG_URL)
                .value_name("URL")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_OUTPUT)
                .help("Write to file instead of stdout")
                .value_name("FILE")
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .short('o')
                .long("output"),
        )
}

async fn open_output(args: &ArgMatches) -> anyhow::Result<Box<dyn AsyncWrite + Send + Unpin>> {
    match args.get_one::<PathBuf>(COMMAND_ARG_OUTPUT) {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .context(format!("failed to create file {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

pub(super) async fn run(ctx: &FetchContext, args: &ArgMatches) -> anyhow::Result<()> {
    let url = args
        .get_one::<String>(COMMAND_ARG_URL)
        .ok_or_else(|| anyhow!("no url set"))?;
    let target = ctx.target(url)?;

    let mut output = open_output(args).await?;
    let size = match target {
        Target::Http(url) => {
            let mut rsp = ctx.http().get(url).await?;
            let size = tokio::io::copy(&mut rsp, &mut output)
                .await
                .context("failed to receive http body")?;
            output.flush().await?;
            size
        }
        Target::Ftp(url) => ctx.ftp().retrieve(&url, &mut output).await?,
    };
    log::info!("received {size} bytes");
    Ok(())
}
