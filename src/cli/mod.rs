//! Terminal front-end: an interactive chat loop and the cache pre-fetcher.

mod progress;

use std::io::Write;
use std::time::Duration;

use console::style;
use indicatif::ProgressBar;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    AppConfig, ChatSession, ChatView, CharCounter, CounterLevel, CredibilityTier, DiskStorage,
    Error, HttpNetwork, HttpTransport, Message, OfflineCache, Role, Source, ToastLevel,
    format_time,
};

use progress::{make_spinner, print_install_report};

/// Line that ends the interactive session.
pub const QUIT_COMMAND: &str = "/quit";

/// Builds a configured HTTP client.
fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

fn flush() {
    let _ = std::io::stdout().flush();
}

/// [`ChatView`] that writes the conversation to stdout.
#[derive(Default)]
pub struct TerminalView {
    spinner: Option<ProgressBar>,
    /// Bytes of the current assistant answer already printed.
    printed: usize,
    streaming: bool,
}

impl TerminalView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn end_answer(&mut self) {
        if self.streaming {
            println!();
            self.streaming = false;
        }
        self.printed = 0;
    }

    fn header(role: Role) -> String {
        let time = format_time(&chrono::Local::now());
        match role {
            Role::User => format!("{} {}", style("You").bold().green(), style(time).dim()),
            Role::Assistant => format!("{} {}", style("MediBot").bold().cyan(), style(time).dim()),
        }
    }
}

impl ChatView for TerminalView {
    fn show_message(&mut self, message: &Message) {
        self.end_answer();
        // user input is already on screen
        if !message.is_user() {
            println!("{}\n{}\n", Self::header(message.role), message.content);
        }
    }

    fn show_working(&mut self) {
        self.spinner = Some(make_spinner("MediBot is thinking..."));
    }

    fn hide_working(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn update_assistant(&mut self, content: &str) {
        if !self.streaming {
            println!("{}", Self::header(Role::Assistant));
            self.streaming = true;
            self.printed = 0;
        }
        if let Some(delta) = content.get(self.printed..) {
            print!("{delta}");
        } else {
            // content was rewritten, not appended
            print!("\n{content}");
        }
        self.printed = content.len();
        flush();
    }

    fn show_sources(&mut self, sources: &[Source]) {
        self.end_answer();
        println!("\n{}", style("Sources").bold());
        for source in sources {
            let percent = format!("{}%", source.credibility_percent());
            let percent = match source.tier() {
                CredibilityTier::High => style(percent).green(),
                CredibilityTier::Medium => style(percent).yellow(),
                CredibilityTier::Low => style(percent).red(),
            };
            println!("  {} {} {percent}", source.icon, source.name);
        }
    }

    fn show_warning(&mut self, text: &str) {
        if self.streaming {
            println!();
        }
        println!("{} {}", style("⚠").yellow().bold(), style(text).yellow());
    }

    fn show_error(&mut self, text: &str) {
        self.hide_working();
        self.end_answer();
        println!("{} {}", style("✗").red().bold(), style(text).red());
    }

    fn disable_input(&mut self) {}

    fn enable_input(&mut self) {
        self.hide_working();
        self.end_answer();
        println!();
    }

    fn toast(&mut self, level: ToastLevel, text: &str) {
        let text = match level {
            ToastLevel::Info => style(text).cyan(),
            ToastLevel::Warning => style(text).yellow(),
            ToastLevel::Error => style(text).red(),
        };
        eprintln!("{text}");
    }
}

/// Runs the interactive chat loop on stdin until EOF or [`QUIT_COMMAND`].
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or stdin fails.
pub async fn run(config: AppConfig) -> crate::Result<()> {
    let chat = config.chat;
    let max = chat.max_message_chars;
    let transport = HttpTransport::with_client(build_http_client()?, chat.clone());
    let mut session = ChatSession::new(chat, transport, TerminalView::new());
    session.start();
    println!(
        "{}",
        style(format!("Type a message, or {QUIT_COMMAND} to exit.")).dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", style(">").bold());
        flush();

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if line.trim() == QUIT_COMMAND {
            break;
        }

        let counter = CharCounter::measure(line.trim(), max);
        if counter.level() != CounterLevel::Normal {
            println!("{}", style(counter.label()).dim());
        }

        match session.send_message(&line).await {
            Ok(outcome) => log::debug!("Exchange finished: {outcome:?}"),
            // already shown as a toast
            Err(Error::Validation(_)) => {}
            Err(e) => return Err(e),
        }
    }

    log::info!("Chat session {} ended", session.session_id());
    Ok(())
}

/// Downloads the asset manifest into the on-disk cache and removes stale
/// buckets.
///
/// # Errors
///
/// Returns an error if the origin is invalid, the HTTP client cannot be
/// built, or stale buckets cannot be removed.
pub async fn precache(config: &AppConfig) -> crate::Result<()> {
    let origin = config.cache_origin()?;
    let manifest = config.cache.manifest.clone();
    let storage = DiskStorage::new(&config.cache.cache_dir);
    let network = HttpNetwork::with_client(build_http_client()?);

    let spinner = make_spinner(format!(
        "Caching {} assets from {origin}...",
        manifest.assets.len()
    ));
    let cache = OfflineCache::new(manifest, origin, storage, network);
    let report = cache.install().await;
    spinner.finish_and_clear();

    let deleted = cache.activate().await?;
    print_install_report(&report, &deleted, cache.storage().root());
    Ok(())
}
