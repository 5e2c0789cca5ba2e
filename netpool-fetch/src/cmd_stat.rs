/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};
use http::header;

use netpool_http::HttpClientError;

use crate::context::{FetchContext, Target};

pub(super) const COMMAND: &str = "stat";

const COMMAND_ARG_URL: &str = "url";

pub(super) fn command() -> Command {
    Command::new(COMMAND)
        .about("Fetch file stats")
        .arg(Arg::new(COMMAND_ARG_URL).value_name("URL").num_args(1).required(true))
}

pub(super) async fn run(ctx: &FetchContext, args: &ArgMatches) -> anyhow::Result<()> {
    let url = args
        .get_one::<String>(COMMAND_ARG_URL)
        .ok_or_else(|| anyhow!("no url set"))?;

    match ctx.target(url)? {
        Target::Http(url) => {
            println!("Url: {url}");
            match ctx.http().head(url).await {
                Ok(rsp) => {
                    println!("Exists: true");
                    if let Some(v) = rsp.headers().get(header::CONTENT_TYPE) {
                        println!("Type: {}", String::from_utf8_lossy(v.as_bytes()));
                    }
                    if let Some(v) = rsp.headers().get(header::CONTENT_LENGTH) {
                        println!("Size: {}", String::from_utf8_lossy(v.as_bytes()));
                    }
                    if let Some(v) = rsp.headers().get(header::LAST_MODIFIED) {
                        println!("Modify Time: {}", String::from_utf8_lossy(v.as_bytes()));
                    }
                }
                Err(e @ HttpClientError::Protocol { .. }) if e.status() == Some(404) => {
                    println!("Exists: false");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Target::Ftp(url) => {
            let ftp = ctx.ftp();
            println!("Url: {url}");
            let exists = ftp.exists(&url).await?;
            println!("Exists: {exists}");
            if exists {
                if ftp.is_directory(&url).await? {
                    println!("Type: directory");
                } else {
                    println!("Type: file");
                    if let Some(size) = ftp.size(&url).await? {
                        println!("Size: {size}");
                    }
                }
            }
        }
    }
    Ok(())
}
