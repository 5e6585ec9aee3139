//! Administration tool for account and publisher management.
//!
//! Reads the same `config.yml` and environment overrides as the server and
//! applies pending migrations before running the command.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;

use newsroom::{
    config::Config,
    db,
    models::{CreateUserInput, MemberRole, Role},
    services::{mailer, Services},
};

#[derive(Parser)]
#[command(name = "newsroom-admin")]
#[command(about = "Account and publisher administration for newsroom")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account (active unless --inactive)
    CreateUser {
        username: String,
        email: String,
        password: String,
        /// reader, journalist or editor
        role: Role,
        #[arg(long)]
        inactive: bool,
    },

    /// Allow an account to log in
    Activate { username: String },

    /// Block an account and end its sessions
    Deactivate { username: String },

    /// Change an account's role
    SetRole { username: String, role: Role },

    /// Create a publisher
    CreatePublisher {
        name: String,
        #[arg(default_value = "")]
        description: String,
    },

    /// Add a user to a publisher as editor or journalist
    AddMember {
        publisher: String,
        username: String,
        member_role: MemberRole,
    },

    /// List accounts, optionally of one role
    ListUsers { role: Option<Role> },

    /// Mail the approval notice for an approved article again
    Notify { article_id: i64 },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsroom=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn status(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "inactive"
    }
}

async fn run(command: Commands) -> Result<()> {
    let config = Config::load_with_env(Path::new("config.yml"))?;
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;
    let services = Services::new(&pool, &config, mailer::from_config(&config.mail)?);

    match command {
        Commands::CreateUser {
            username,
            email,
            password,
            role,
            inactive,
        } => {
            let input = CreateUserInput::new(username, email, password, role);
            let user = services.users.create_user(input, !inactive).await?;
            println!(
                "Created {} '{}' (id {}, {})",
                user.role.label(),
                user.username,
                user.id,
                status(user.is_active)
            );
        }
        Commands::Activate { username } => {
            let user = services.users.set_active(&username, true).await?;
            println!("User '{}' is now {}", user.username, status(true));
        }
        Commands::Deactivate { username } => {
            let user = services.users.set_active(&username, false).await?;
            println!("User '{}' is now {}", user.username, status(false));
        }
        Commands::SetRole { username, role } => {
            let user = services.users.set_role(&username, role).await?;
            println!("User '{}' is now a {}", user.username, user.role.label());
        }
        Commands::CreatePublisher { name, description } => {
            let publisher = services
                .publishers
                .create_publisher(&name, &description)
                .await?;
            println!("Created publisher '{}' (id {})", publisher.name, publisher.id);
        }
        Commands::AddMember {
            publisher,
            username,
            member_role,
        } => {
            let publisher = services
                .publishers
                .find_by_name(&publisher)
                .await?
                .with_context(|| format!("Publisher '{}' not found", publisher))?;
            let user = services
                .users
                .get_by_username(&username)
                .await?
                .with_context(|| format!("User '{}' not found", username))?;

            let membership = services
                .publishers
                .add_member(publisher.id, user.id, member_role)
                .await?;
            println!(
                "Added '{}' to '{}' as {} (membership id {})",
                user.username, publisher.name, member_role, membership.id
            );
        }
        Commands::ListUsers { role } => {
            for user in services.users.list_users(role).await? {
                println!(
                    "{:>5}  {:<20} {:<11} {:<30} {}",
                    user.id,
                    user.username,
                    user.role.as_str(),
                    user.email,
                    status(user.is_active)
                );
            }
        }
        Commands::Notify { article_id } => {
            let approval = services.articles.resend_notifications(article_id).await?;
            println!(
                "Notified {} subscriber(s) about '{}'",
                approval.notified, approval.article.title
            );
        }
    }

    Ok(())
}
