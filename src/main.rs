use anyhow::Context;
use birthday_notifier::adapters::clock::SystemClock;
use birthday_notifier::adapters::csv_import::{import_csv_file, ImportOptions};
use birthday_notifier::adapters::greeter::build_greeter;
use birthday_notifier::adapters::run_lock::RunLock;
use birthday_notifier::adapters::telegram::token_status;
use birthday_notifier::core::composer::{MessageComposer, TextFormat, FALLBACK_CLOSING};
use birthday_notifier::core::dispatch::Dispatcher;
use birthday_notifier::core::matcher::{local_date, match_on, upcoming};
use birthday_notifier::core::schedule::{self, DailySchedule};
use birthday_notifier::domain::model::{DeliveryStatus, Roster, RunReport};
use birthday_notifier::domain::ports::{Clock, CredentialStatus};
use birthday_notifier::utils::error::{ErrorSeverity, NotifierError};
use birthday_notifier::utils::{logger, validation};
use birthday_notifier::{
    Cli, Command, DateCode, LocalStorage, NotificationJob, RosterStore, RunSource, TelegramNotifier, TomlConfig,
};
use chrono::Days;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 只補上尚未設定的環境變數
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting birthday-notifier");
    if cli.verbose {
        tracing::debug!("CLI args: {:?}", cli);
    }

    let config = match TomlConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => exit_with(e.into()),
    };

    // 驗證配置
    if let Err(e) = validation::Validate::validate(&config) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let result = match cli.command() {
        Command::Serve => serve(&config).await,
        Command::RunNow => run_now(&config).await,
        Command::Upcoming { days, json } => list_upcoming(&config, days, json).await,
        Command::List => list_roster(&config).await,
        Command::Greet { names } => greet(&config, &names),
        Command::Check { offline } => check(&config, offline).await,
        Command::Import {
            file,
            name_column,
            birthday_column,
            append,
        } => import(&config, &file, ImportOptions::with_columns(name_column, birthday_column), append).await,
    };

    if let Err(e) = result {
        exit_with(e);
    }

    Ok(())
}

fn exit_with(error: anyhow::Error) -> ! {
    let Some(e) = error.downcast_ref::<NotifierError>() else {
        tracing::error!("❌ {:#}", error);
        eprintln!("❌ {:#}", error);
        std::process::exit(1);
    };

    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn roster_store(config: &TomlConfig) -> RosterStore<LocalStorage> {
    RosterStore::new(LocalStorage::new("."), config.roster.path.clone())
}

fn telegram(config: &TomlConfig) -> birthday_notifier::Result<TelegramNotifier> {
    TelegramNotifier::new(
        &config.bot.api_base,
        config.bot.token.clone(),
        config.parse_mode()?,
        config.send_timeout(),
    )
}

fn build_job(config: &TomlConfig) -> birthday_notifier::Result<Arc<NotificationJob<LocalStorage>>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let format = config.text_format()?;
    let composer = MessageComposer::new(build_greeter(&config.greetings, clock.clone(), format)).with_format(format);
    let dispatcher = Dispatcher::new(Arc::new(telegram(config)?), config.send_timeout());

    let store = roster_store(config);
    let run_lock = RunLock::beside(&LocalStorage::new(".").resolve(store.path()));

    Ok(Arc::new(
        NotificationJob::new(
            store,
            composer,
            dispatcher,
            config.recipients(),
            config.utc_offset()?,
            clock,
        )
        .with_run_lock(run_lock),
    ))
}

async fn serve(config: &TomlConfig) -> anyhow::Result<()> {
    let job = build_job(config)?;

    if let Err(e) = job.check_preconditions() {
        tracing::warn!("⚠️ {}; scheduled runs will abort until this is fixed", e);
    }

    let (schedule, handle) = schedule::register(job.clone(), &config.schedule.time)?;

    tracing::info!(
        "🤖 Notifier running: daily at {} ({}), {} recipients, roster {}",
        schedule.at().format("%H:%M"),
        schedule.offset(),
        job.recipients().len(),
        config.roster.path
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;

    tracing::info!("👋 Shutting down, waiting for any run in progress");
    let _permit = job.quiesce().await;
    handle.abort();

    Ok(())
}

async fn run_now(config: &TomlConfig) -> anyhow::Result<()> {
    let job = build_job(config)?;
    let report = job.run_once(RunSource::Manual).await?;

    match &report {
        RunReport::NothingToSend { .. } => {
            println!("📭 No birthdays today or tomorrow, nothing sent.");
        }
        RunReport::Dispatched {
            message,
            outcomes,
            summary,
            ..
        } => {
            let matches = report.matches();
            println!(
                "📅 Today: {}; tomorrow: {}\n",
                describe(&matches.today),
                describe(&matches.tomorrow)
            );
            println!("{}\n", message);
            for outcome in outcomes {
                match &outcome.status {
                    DeliveryStatus::Sent => println!("✅ {}", outcome.recipient),
                    DeliveryStatus::Failed(failure) => {
                        println!("❌ {} [{}]: {}", outcome.recipient, failure.kind(), failure)
                    }
                }
            }
            println!("\n📊 {} sent, {} failed", summary.sent, summary.failed);
        }
    }

    Ok(())
}

async fn list_upcoming(config: &TomlConfig, days: u32, json: bool) -> anyhow::Result<()> {
    let roster = roster_store(config).load().await?;
    let today = local_date(SystemClock.now(), config.utc_offset()?);
    let found = upcoming(today, &roster, days);

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }

    if found.is_empty() {
        println!("No birthdays in the next {} days.", days);
        return Ok(());
    }

    println!("🎂 Birthdays in the next {} days:", days);
    for item in found {
        println!("  {:<18} {}  {}", item.label, item.birthday, item.name);
    }

    Ok(())
}

async fn list_roster(config: &TomlConfig) -> anyhow::Result<()> {
    let store = roster_store(config);
    let loaded = store.load_with_report().await?;

    println!("📋 {} ({} records)", store.path(), loaded.roster.len());
    for record in loaded.roster.iter() {
        println!("{}  {}", record.name, record.birthday);
    }
    for skipped in &loaded.skipped {
        println!("⚠️ record #{} skipped: {}", skipped.index, skipped.reason);
    }

    Ok(())
}

/// Console preview, so names are printed unescaped.
fn greet(config: &TomlConfig, names: &[String]) -> anyhow::Result<()> {
    let greeter = build_greeter(&config.greetings, Arc::new(SystemClock), TextFormat::Plain);

    let greeting = match names {
        [single] => greeter.personal_greeting(single),
        _ => greeter.collective_greeting(names),
    };

    match greeting.filter(|text| !text.trim().is_empty()) {
        Some(text) => println!("{}", text),
        None => println!("(no greeting available, the digest would show the header only)"),
    }
    println!(
        "{}",
        greeter
            .closing_phrase()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_CLOSING.to_string())
    );

    Ok(())
}

async fn check(config: &TomlConfig, offline: bool) -> anyhow::Result<()> {
    let mut problems = 0usize;
    println!("✅ Configuration is valid");

    match validation::validate_required_field("bot.token", &config.bot.token) {
        Err(e) => {
            problems += 1;
            println!("❌ {}", e);
        }
        Ok(token) => match token_status(Some(token)) {
            CredentialStatus::Valid => println!("✅ Bot token is set"),
            CredentialStatus::Missing => {
                problems += 1;
                println!("❌ Bot token is empty");
            }
            CredentialStatus::Placeholder => {
                problems += 1;
                println!("❌ Bot token still has its placeholder value");
            }
        },
    }

    let recipients = config.recipients();
    if recipients.is_empty() {
        problems += 1;
        println!("❌ No recipients configured");
    } else {
        println!("✅ {} recipients configured", recipients.len());
    }

    let offset = config.utc_offset()?;
    let today = local_date(SystemClock.now(), offset);
    match roster_store(config).load_with_report().await {
        Ok(loaded) => {
            println!("✅ Roster {}: {} records", config.roster.path, loaded.roster.len());
            for skipped in &loaded.skipped {
                println!("   ⚠️ record #{} skipped: {}", skipped.index, skipped.reason);
            }

            let matches = match_on(today, &loaded.roster);
            let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
            println!(
                "📅 Today {}: {}",
                DateCode::from_date(&today),
                describe(&matches.today)
            );
            println!(
                "📅 Tomorrow {}: {}",
                DateCode::from_date(&tomorrow),
                describe(&matches.tomorrow)
            );
        }
        Err(e) => {
            problems += 1;
            println!("❌ {}", e.user_friendly_message());
        }
    }

    match DailySchedule::parse(&config.schedule.time, offset) {
        Ok(schedule) => println!(
            "⏰ Next run at {}",
            schedule
                .next_after(SystemClock.now())
                .with_timezone(&offset)
                .format("%Y-%m-%d %H:%M %:z")
        ),
        Err(e) => {
            problems += 1;
            println!("❌ {}", e);
        }
    }

    if !offline && token_status(config.bot.token.as_deref()) == CredentialStatus::Valid {
        match telegram(config)?.get_me().await {
            Ok(bot) => println!(
                "✅ Bot API reachable as {} (@{})",
                bot.first_name,
                bot.username.unwrap_or_default()
            ),
            Err(e) => {
                problems += 1;
                println!("❌ Bot API check failed: {}", e);
            }
        }
    }

    if problems > 0 {
        return Err(NotifierError::config(format!("{} problem(s) found", problems)).into());
    }

    println!("\n🎉 All checks passed");
    Ok(())
}

fn describe(names: &[String]) -> String {
    if names.is_empty() {
        "nobody".to_string()
    } else {
        names.join(", ")
    }
}

async fn import(config: &TomlConfig, file: &Path, options: ImportOptions, append: bool) -> anyhow::Result<()> {
    validation::validate_file_extensions("import.file", &[file.display().to_string()], &["csv"])?;

    let report = import_csv_file(file, &options)?;
    let store = roster_store(config);

    let mut roster = if append { store.load().await? } else { Roster::default() };
    let imported = report.roster.len();
    roster.extend(report.roster);
    store.save(&roster).await?;

    println!(
        "📥 Imported {} records into {} ({} skipped, {} total)",
        imported,
        store.path(),
        report.skipped.len(),
        roster.len()
    );
    for skipped in &report.skipped {
        println!("   ⚠️ line {}: {}", skipped.line, skipped.reason);
    }

    Ok(())
}
