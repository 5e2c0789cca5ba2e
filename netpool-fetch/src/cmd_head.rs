/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};

use crate::context::{FetchContext, Target};

pub(super) const COMMAND: &str = "head";

const COMMAND_ARG_URL: &str = "url";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Show the response header of a HEAD request")
        .arg(
            Arg::new(COMMAND_ARG_URL)
                .value_name("URL")
                .num_args(1)
                .required(true),
        )
}

pub(super) async fn run(ctx: &FetchContext, args: &ArgMatches) -> anyhow::Result<()> {
    let url = args
        .get_one::<String>(COMMAND_ARG_URL)
        .ok_or_else(|| anyhow!("no url set"))?;
    let Target::Http(url) = ctx.target(url)? else {
        return Err(anyhow!("head is only available for http urls, use stat instead"));
    };

    let rsp = ctx.http().head(url).await?;
    log::info!("final url {}", rsp.url());
    println!("{:?} {} {}", rsp.version(), rsp.code(), rsp.reason());
    for (name, value) in rsp.headers() {
        println!("{name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
    Ok(())
}
