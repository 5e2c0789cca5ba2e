/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};
use http::Method;

use netpool_http::HttpRequest;

use crate::context::{FetchContext, Target};

pub(super) const COMMAND: &str = "del";

const COMMAND_ARG_URL: &str = "url";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Delete a file or an empty ftp directory")
        .arg(Arg::new(COMMAND_ARG_URL).value_name("URL").num_args(1).required(true))
}

pub(super) async fn run(ctx: &FetchContext, args: &ArgMatches) -> anyhow::Result<()> {
    let url = args
        .get_one::<String>(COMMAND_ARG_URL)
        .ok_or_else(|| anyhow!("no url set"))?;

    match ctx.target(url)? {
        Target::Http(url) => {
            let req = HttpRequest::new(Method::DELETE, url)?;
            let rsp = ctx.http().execute(req).await?;
            println!("{} {}", rsp.code(), rsp.reason());
            let _ = rsp.bytes().await;
        }
        Target::Ftp(url) => {
            let ftp = ctx.ftp();
            if ftp.is_directory(&url).await? {
                ftp.remove_dir(&url).await?;
            } else {
                ftp.delete(&url).await?;
            }
        }
    }
    Ok(())
}
