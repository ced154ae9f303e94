use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Currency, Engine, Money, Wallet};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection, EntityTrait};

use account::users;

mod account;
mod prompt;

#[derive(Parser, Debug)]
#[command(name = "wallet_admin")]
#[command(about = "Admin utilities for the wallet service (users, wallets, audits)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./wallet.db?mode=rwc")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Wallet(WalletCmd),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Create a user together with its wallet.
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long, default_value = "Main")]
    wallet_name: String,
    #[arg(long, default_value = "USD", value_parser = parse_currency)]
    currency: Currency,
}

#[derive(Args, Debug)]
struct WalletCmd {
    #[command(subcommand)]
    command: WalletCommand,
}

#[derive(Args, Debug)]
struct OwnerArgs {
    #[arg(long)]
    owner: String,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    /// Reject further fundings. Balance and ledger are kept.
    Deactivate(OwnerArgs),
    Activate(OwnerArgs),
    Show(OwnerArgs),
    /// Check the balance against the ledger.
    Audit(OwnerArgs),
}

fn parse_currency(raw: &str) -> Result<Currency, String> {
    Currency::try_from(raw).map_err(|err| err.to_string())
}

fn print_wallet(wallet: &Wallet) {
    println!("wallet:   {}", wallet.id);
    println!("owner:    {}", wallet.owner_id);
    println!("name:     {}", wallet.name);
    println!(
        "balance:  {} {}",
        Money::new(wallet.balance),
        wallet.currency
    );
    println!("active:   {}", wallet.active);
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn create_user(
    db: &DatabaseConnection,
    args: UserCreateArgs,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    if users::Entity::find_by_id(args.username.clone())
        .one(db)
        .await?
        .is_some()
    {
        eprintln!("user already exists: {}", args.username);
        std::process::exit(1);
    }
    if args.wallet_name.trim().is_empty() {
        eprintln!("wallet name must not be empty");
        std::process::exit(1);
    }

    let password = prompt::new_password()?;
    let wallet = account::create_account(
        db,
        &args.username,
        password,
        &args.wallet_name,
        args.currency,
    )
    .await?;
    println!("created user: {}", args.username);
    print_wallet(&wallet);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db.clone()).build().await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => create_user(&db, args).await?,
        Command::Wallet(WalletCmd { command }) => match command {
            WalletCommand::Deactivate(args) => {
                let wallet = engine.set_wallet_active(&args.owner, false).await?;
                println!("deactivated wallet {} of {}", wallet.id, wallet.owner_id);
            }
            WalletCommand::Activate(args) => {
                let wallet = engine.set_wallet_active(&args.owner, true).await?;
                println!("activated wallet {} of {}", wallet.id, wallet.owner_id);
            }
            WalletCommand::Show(args) => {
                let wallet = engine.wallet_by_owner(&args.owner).await?;
                print_wallet(&wallet);
            }
            WalletCommand::Audit(args) => {
                let wallet = engine.wallet_by_owner(&args.owner).await?;
                match engine.audit_wallet(wallet.id).await {
                    Ok(audit) => println!(
                        "ledger ok: {} completed of {} entries, balance {}",
                        audit.completed,
                        audit.entries,
                        Money::new(audit.balance)
                    ),
                    Err(err) => {
                        eprintln!("ledger audit failed: {err}");
                        std::process::exit(1);
                    }
                }
            }
        },
    }

    Ok(())
}
