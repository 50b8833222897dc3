use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::json;

#[derive(Parser)]
#[command(name = "pb-cli")]
#[command(about = "Superuser management for the pb-host admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:2019")]
    url: String,

    /// Admin API key, if the host requires one.
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage superuser accounts
    #[command(subcommand)]
    Superuser(SuperuserCommand),
}

#[derive(Subcommand)]
enum SuperuserCommand {
    /// Create a new account; fails if the email is taken
    Create { email: String, password: String },
    /// Create the account or replace its password
    Upsert { email: String, password: String },
    /// Change the password of an existing account
    Update { email: String, password: String },
    /// Delete the account if it exists
    Delete { email: String },
    /// Issue a one-time password for the account
    Otp { email: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let base = cli.url.trim_end_matches('/');
    let superuser = format!("{}/pocketbase/superuser", base);

    let Commands::Superuser(command) = cli.command;
    let res = match command {
        SuperuserCommand::Create { email, password } => {
            client
                .post(&superuser)
                .headers(headers)
                .json(&json!({ "email_address": email, "password": password }))
                .send()
                .await?
        }
        SuperuserCommand::Upsert { email, password } => {
            client
                .put(&superuser)
                .headers(headers)
                .json(&json!({ "email_address": email, "password": password }))
                .send()
                .await?
        }
        SuperuserCommand::Update { email, password } => {
            client
                .patch(&superuser)
                .headers(headers)
                .json(&json!({ "email_address": email, "password": password }))
                .send()
                .await?
        }
        SuperuserCommand::Delete { email } => {
            client
                .delete(&superuser)
                .headers(headers)
                .json(&json!({ "email_address": email }))
                .send()
                .await?
        }
        SuperuserCommand::Otp { email } => {
            let mut url = reqwest::Url::parse(&superuser)?;
            url.path_segments_mut()
                .map_err(|_| "admin URL cannot be a base")?
                .push(&email)
                .push("otp");
            client.post(url).headers(headers).send().await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if !text.is_empty() {
            eprintln!("{}", text);
        }
        std::process::exit(1);
    }

    println!("OK ({})", status);
    Ok(())
}
