use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, value_parser};
use tracing_subscriber::{EnvFilter, fmt};

use client::{
    Outcome,
    models::{Admin, AnswerValue, SubmissionPayload},
    storage::LocalStore,
    submit,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory backing local storage.
    #[arg(long, env = "FEEDBACK_STORE_DIR", default_value = ".feedback")]
    store_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one submission, keeping it locally if the API is unavailable.
    Send {
        #[arg(long, env = "FEEDBACK_API_URL")]
        api_url: Option<String>,

        #[arg(long, value_parser = non_blank)]
        user_id: String,

        #[arg(long, default_value_t = 1, value_parser = value_parser!(u32).range(1..=1000))]
        repeat_count: u32,

        #[arg(long, env = "DB_PASSWORD", hide_env_values = true, value_parser = non_blank)]
        db_password: String,

        /// Slider answer as `id=value`, repeatable.
        #[arg(long = "answer", value_parser = parse_answer, required = true)]
        answers: Vec<AnswerValue>,
    },

    /// Print submissions kept in local storage.
    List,
}

fn non_blank(raw: &str) -> anyhow::Result<String> {
    if raw.trim().is_empty() {
        bail!("must not be blank");
    }

    Ok(raw.to_string())
}

fn parse_answer(raw: &str) -> anyhow::Result<AnswerValue> {
    let Some((id, value)) = raw.split_once('=') else {
        bail!("expected id=value, got {raw}");
    };

    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {id}"))?;

    Ok(AnswerValue {
        id: id.trim().to_string(),
        value,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let store = LocalStore::new(args.store_dir);

    match args.command {
        Command::Send {
            api_url,
            user_id,
            repeat_count,
            db_password,
            answers,
        } => {
            let payload = SubmissionPayload {
                admin: Some(Admin::new(&user_id, repeat_count, &db_password)?),
                answers,
            };

            let http = reqwest::Client::new();
            match submit(&http, api_url.as_deref(), &payload, &store).await? {
                Outcome::Remote { id } => println!("Saved to the database, id={id}"),
                Outcome::Local(entry) => {
                    println!("Saved locally (offline fallback), id={}\n", entry.id);
                    if let Some(admin) = &entry.admin {
                        println!("Admin");
                        println!("- userId: {}", admin.user_id);
                        println!("- repeatCount: {}\n", admin.repeat_count);
                    }
                    println!("Submitted scores:");
                    for answer in &entry.answers {
                        println!("{}: {:.2}", answer.id, answer.value);
                    }
                }
            }
        }
        Command::List => {
            let entries = store.load_submissions();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}
