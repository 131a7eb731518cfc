use chatline::api::HttpChatApi;
use chatline::{
    CoordinatorOptions, FileSessionStore, Message, Outcome, RequestCoordinator, RequestState,
    Role, SessionContext,
};
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chatline")]
#[command(about = "Chatline CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Check whether the chat service answers on its root endpoint.
    Health {
        /// Config file path (default: CHATLINE_CONFIG_PATH or ~/.chatline/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Chat with the assistant (interactive). Commands: /retry, /clear, /exit.
    Chat {
        /// Config file path (default: CHATLINE_CONFIG_PATH or ~/.chatline/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Chat service base URL (overrides config and CHATLINE_API_URL)
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("chatline {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Health { config }) => {
            if let Err(e) = run_health(config).await {
                log::error!("health check failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, api_url }) => {
            if let Err(e) = run_chat(config, api_url).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn build_coordinator(
    config_path: Option<std::path::PathBuf>,
    api_url: Option<String>,
) -> anyhow::Result<RequestCoordinator> {
    let (config, path) = chatline::config::load_config(config_path)?;
    log::debug!("loaded config from {}", path.display());
    let Some(url) = api_url else {
        return Ok(RequestCoordinator::from_config(&config)?);
    };
    // an explicit flag beats both the config file and CHATLINE_API_URL
    let api = HttpChatApi::new(url, config.api.timeout())?;
    let store = FileSessionStore::new(chatline::config::resolve_session_path(&config));
    Ok(RequestCoordinator::new(
        Arc::new(api),
        SessionContext::new(Arc::new(store)),
        CoordinatorOptions::from(&config.ui),
    ))
}

async fn run_health(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let coordinator = build_coordinator(config_path, None)?;
    match coordinator.probe_health().await {
        Some(h) if h.is_healthy() => println!("chat service is up"),
        Some(h) => {
            let text = h.notice_text().unwrap_or("chat service is not healthy");
            anyhow::bail!("{}", text);
        }
        None => {}
    }
    Ok(())
}

fn render(m: &Message) {
    let tag = match m.role {
        Role::User => ">",
        Role::Assistant => "<",
        Role::Error => "!",
    };
    println!(
        "[{}] {} {}",
        m.timestamp.with_timezone(&chrono::Local).format("%H:%M"),
        tag,
        m.content.trim()
    );
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    api_url: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let coordinator = build_coordinator(config_path, api_url)?;
    coordinator.probe_health().await;
    if let Some(notice) = coordinator.notice() {
        eprintln!("** {}", notice.text);
    }
    for m in coordinator.messages() {
        render(&m);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let before = coordinator.messages().len();
        let retrying = input.eq_ignore_ascii_case("/retry");
        let dispatch = if retrying {
            coordinator.retry()
        } else if input.eq_ignore_ascii_case("/clear") {
            coordinator.clear()
        } else {
            coordinator.send(input)
        };

        match dispatch {
            Some(d) => match d.await {
                Outcome::Cleared => {
                    for m in coordinator.messages() {
                        render(&m);
                    }
                }
                Outcome::Replied | Outcome::Failed(_) => {
                    // a typed line is already on screen; a retried one is not
                    for m in coordinator
                        .messages()
                        .iter()
                        .skip(before)
                        .filter(|m| retrying || m.role != Role::User)
                    {
                        render(m);
                    }
                }
            },
            None => {
                if let RequestState::Error(e) = coordinator.request_state() {
                    eprintln!("** {}", e);
                }
            }
        }
    }

    Ok(())
}
