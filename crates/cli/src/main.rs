use clap::{Parser, Subcommand};
use lib::controller::{ChatController, ControllerError, MountOutcome, SendOutcome};
use lib::llm::RelayClient;
use lib::mode::Mode;
use lib::session::SessionManager;
use lib::transcript::{Message, Role};

#[derive(Parser)]
#[command(name = "modechat")]
#[command(about = "Persona-mode chat: gateway and terminal client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: MODECHAT_CONFIG_PATH or ~/.modechat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// List the available modes.
    Modes,

    /// Run the gateway (HTTP relay to the completion backend).
    Gateway {
        /// Config file path (default: MODECHAT_CONFIG_PATH or ~/.modechat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 15151)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat through the gateway (interactive). Type /mode <name> to switch modes, /exit to quit.
    Chat {
        /// Config file path (default: MODECHAT_CONFIG_PATH or ~/.modechat/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Switch to this mode when the chat starts.
        #[arg(long, short)]
        mode: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("modechat {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Modes) => {
            for mode in Mode::ALL {
                println!("{:<10} {:<20} {}", mode.as_str(), mode.label(), mode.description());
            }
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, mode }) => {
            if let Err(e) = run_chat(config, mode).await {
                log::error!("chat failed: {:#}", e);
                eprintln!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!("starting gateway on {}:{}", config.gateway.bind, config.gateway.port);
    lib::gateway::run_gateway(config, path).await
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => ">",
        Role::Assistant => "<",
    };
    println!("{} {}", who, message.content.trim());
}

fn print_notices<C>(controller: &mut ChatController<C>) {
    for notice in controller.take_notices() {
        eprintln!("! {}", notice);
    }
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    start_mode: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, path) = lib::config::load_config(config_path)?;
    let start_mode = match start_mode {
        Some(name) => Some(name.parse::<Mode>()?),
        None => config.client.default_mode,
    };
    let token = lib::config::resolve_client_token(&config);
    let identity = lib::auth::from_config(&config)?;
    let store = lib::store::open(&config, &path, token.as_deref()).await?;
    let relay = RelayClient::new(
        lib::config::resolve_gateway_url(&config),
        token.clone().unwrap_or_default(),
    );
    let mut controller = ChatController::new(SessionManager::new(store), relay);

    if controller.mount(identity.as_ref(), token.as_deref()).await? == MountOutcome::RedirectToSignIn {
        anyhow::bail!("not signed in: set client.token in the config or MODECHAT_TOKEN");
    }
    print_notices(&mut controller);
    for message in controller.transcript().messages() {
        print_message(message);
    }
    if let Some(mode) = start_mode {
        if controller.mode() != Some(mode) {
            let notice = controller.change_mode(mode).await?;
            print_message(&notice);
            print_notices(&mut controller);
        }
    }
    if let Some(mode) = controller.mode() {
        println!("[{}] {}", mode.label(), mode.description());
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
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/modes") {
            for mode in Mode::ALL {
                println!("  {:<10} {}", mode.as_str(), mode.description());
            }
            continue;
        }
        if let Some(name) = input.strip_prefix("/mode") {
            match name.parse::<Mode>() {
                Ok(mode) => {
                    let notice = controller.change_mode(mode).await?;
                    print_message(&notice);
                }
                Err(e) => eprintln!("! {} (try /modes)", e),
            }
            print_notices(&mut controller);
            continue;
        }

        match controller.send(input).await {
            Ok(SendOutcome::Replied(reply)) => print_message(&reply),
            Ok(SendOutcome::Failed(_)) => {}
            Ok(SendOutcome::RedirectToSignIn) => {
                anyhow::bail!("signed out: the gateway rejected the token; sign in again and update client.token or MODECHAT_TOKEN");
            }
            Err(ControllerError::EmptyMessage) => {}
            Err(e) => eprintln!("! {}", e),
        }
        print_notices(&mut controller);
    }

    Ok(())
}
