/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgMatches, Command, value_parser};

use netpool_http::FileBody;

use crate::context::{FetchContext, Target};

pub(super) const COMMAND: &str = "put";

const COMMAND_ARG_URL: &str = "url";
const COMMAND_ARG_FILE: &str = "file";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Upload a local file")
        .arg(
            Arg::new(COMMAND_ARG_URL)
                .value_name("URL")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new(COMMAND_ARG_FILE)
                .value_name("LOCAL FILE")
                .num_args(1)
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
}

pub(super) async fn run(ctx: &FetchContext, args: &ArgMatches) -> anyhow::Result<()> {
    let url = args
        .get_one::<String>(COMMAND_ARG_URL)
        .ok_or_else(|| anyhow!("no url set"))?;
    let path = args
        .get_one::<PathBuf>(COMMAND_ARG_FILE)
        .ok_or_else(|| anyhow!("no local file set"))?;

    match ctx.target(url)? {
        Target::Http(url) => {
            let rsp = ctx.http().put(url, FileBody::new(path)).await?;
            println!("{} {}", rsp.code(), rsp.reason());
            // drain so that the connection goes back to the pool
            let _ = rsp.bytes().await;
        }
        Target::Ftp(url) => {
            let mut file = tokio::fs::File::open(path)
                .await
                .context(format!("failed to open file {}", path.display()))?;
            let size = ctx.ftp().store(&url, &mut file).await?;
            println!("stored {size} bytes");
        }
    }
    Ok(())
}
