/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};

use crate::context::{FetchContext, Target};

pub(super) const COMMAND: &str = "list";

const COMMAND_ARG_URL: &str = "url";

pub(super) fn command() -> Command {
    Command::new(COMMAND).about("List directory").arg(
        Arg::new(COMMAND_ARG_URL)
            .value_name("FTP URL")
            .num_args(1)
            .required(true),
    )
}

pub(super) async fn run(ctx: &FetchContext, args: &ArgMatches) -> anyhow::Result<()> {
    let url = args
        .get_one::<String>(COMMAND_ARG_URL)
        .ok_or_else(|| anyhow!("no url set"))?;
    let Target::Ftp(url) = ctx.target(url)? else {
        return Err(anyhow!("list is only available for ftp urls"));
    };

    for name in ctx.ftp().list(&url).await? {
        println!("{name}");
    }
    Ok(())
}
