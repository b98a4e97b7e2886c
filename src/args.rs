use clap::{builder::BoolishValueParser, Args, Parser, Subcommand};
use crate::settings::MAX_TIMEOUT_SECS;
use std::path::PathBuf;

/// Executes problematic s3 calls for debugging purposes.
#[derive(Parser, Debug)]
#[command(name = "s3test", version, about = "tests failing s3 call")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// config file (default is $HOME/.s3test.yaml)
    #[arg(long, global = true, env = "S3TEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Access key (required)
    #[arg(short, long, global = true, env = "S3TEST_KEY")]
    pub key: Option<String>,

    /// Access secret (required)
    #[arg(short, long, global = true, env = "S3TEST_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// S3 endpoint (required)
    #[arg(short, long, global = true, env = "S3TEST_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Bucket (required)
    #[arg(short, long, global = true, env = "S3TEST_BUCKET")]
    pub bucket: Option<String>,

    /// Region used to sign requests [default: eu-west-3]
    #[arg(long, global = true, env = "S3TEST_REGION")]
    pub region: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// execute s3 listObjects
    ///
    /// Executes the problematic listObjects API request that times out.
    #[command(name = "listObjects")]
    ListObjects(ListObjectsArgs),
}

#[derive(Args, Debug, Default)]
pub struct ListObjectsArgs {
    /// request timeout in seconds [default: 50]
    #[arg(
        short,
        long,
        env = "S3TEST_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(..=MAX_TIMEOUT_SECS)
    )]
    pub timeout: Option<u64>,

    /// object prefix to use [default: transient_BatchManagerCache/]
    #[arg(short, long, env = "S3TEST_PREFIX")]
    pub prefix: Option<String>,

    /// enable debug mode
    #[arg(
        long,
        env = "S3TEST_DEBUG",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub debug: Option<bool>,

    /// limit max-keys [default: 1000]
    #[arg(short, long, env = "S3TEST_LIMIT")]
    pub limit: Option<u32>,
}
