use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workline::cli::{commands, exit, Cli, Commands};

/// Initialize tracing on stderr so stdout stays pipeable
fn init_tracing(verbose: bool) {
    let default = if verbose { "workline=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("WORKLINE_LOG").unwrap_or_else(|_| default.into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn dispatch(cli: Cli) -> miette::Result<i32> {
    let global = cli.global;
    let ok = |result: miette::Result<()>| result.map(|()| exit::OK);

    match cli.command {
        Commands::Init(args) => ok(commands::init::run(args)),
        Commands::Index(cmd) => commands::index::run(cmd, &global),
        Commands::List(args) => ok(commands::list::run(args, &global)),
        Commands::Show(args) => commands::show::run(args, &global),
        Commands::Tree(args) => commands::tree::run(args, &global),
        Commands::Related(args) => commands::related::run(args, &global),
        Commands::Transitions(args) => commands::transition::run_available(args, &global),
        Commands::Transition(args) => commands::transition::run(args, &global),
        Commands::Overview(args) => ok(commands::overview::run(args, &global)),
        Commands::Completions(args) => ok(commands::completions::run(args)),
    }
}

fn main() {
    // Reset SIGPIPE to default behavior (terminate silently) for proper Unix piping.
    // Without this, piping to `head`, `grep -q`, etc. causes a panic on broken pipe.
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }

    // Install miette's fancy error handler
    let hook = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }));
    if let Err(e) = hook {
        eprintln!("warning: {}", e);
    }

    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{:?}", report);
            exit::FATAL
        }
    };
    std::process::exit(code);
}
