//! webstore-post - encode and post a message, or fetch one back.

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webstore::codec::Algorithm;
use webstore::post::{prepare, StoreClient};

#[derive(Parser, Debug)]
#[command(name = "webstore-post")]
#[command(version, about = "Post Z85-encoded data to a webstore server", long_about = None)]
struct Cli {
    #[command(flatten)]
    server: ServerArgs,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print request details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct ServerArgs {
    /// Host to connect to
    #[arg(short = 'H', long, global = true, default_value = "localhost")]
    host: String,

    /// Port to connect to
    #[arg(short = 'P', long, global = true, default_value_t = 8080)]
    port: u16,

    /// Use HTTPS
    #[arg(short = 's', long, global = true)]
    https: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a message or file and post it
    Post {
        /// File to encode and post
        #[arg(short, long, conflicts_with = "message", required_unless_present = "message")]
        file: Option<PathBuf>,

        /// Message to encode and post
        #[arg(short, long)]
        message: Option<String>,

        /// Algorithm: md5, sha1, sha224, sha256, sha384, sha512 or 1-6
        #[arg(short, long)]
        alg: Option<Algorithm>,

        /// Post under this token instead of the digest of the data
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Fetch a payload and write the decoded bytes out
    Get {
        /// Algorithm the token belongs to; inferred from its length if omitted
        #[arg(short, long)]
        alg: Option<Algorithm>,

        /// Token returned when the payload was posted
        token: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "webstore=debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let client = StoreClient::new(&cli.server.host, cli.server.port, cli.server.https)?;

    match cli.command {
        Command::Post {
            file,
            message,
            alg,
            token,
        } => {
            let raw = match (file, message) {
                (Some(path), _) => std::fs::read(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?,
                (None, Some(message)) => message.into_bytes(),
                (None, None) => bail!("nothing to post; use --file or --message"),
            };
            if raw.is_empty() {
                bail!("refusing to post an empty message");
            }

            let prepared = prepare(&raw, alg, token.as_deref())?;
            if cli.verbose {
                eprintln!(
                    "Posting {} bytes ({} encoded) to {}",
                    raw.len(),
                    prepared.encoded.len(),
                    client.url(prepared.algorithm, &prepared.token)
                );
            }
            client.post(&prepared).await?;

            if !cli.quiet {
                println!("Token: {}", prepared.token);
            }
        }
        Command::Get { alg, token, output } => {
            let algorithm = match alg {
                Some(alg) => alg,
                None => Algorithm::from_key_len(token.len()).with_context(|| {
                    format!("token length {} matches no supported algorithm", token.len())
                })?,
            };
            let data = client.fetch_decoded(algorithm, &token).await?;

            match output {
                Some(path) => std::fs::write(&path, &data)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&data)?;
                    stdout.flush()?;
                }
            }
        }
    }

    Ok(())
}
