use clap::Parser;
use packrat::{
    cli::{self, Cli, Cmd},
    commands,
};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();
    let settings = commands::load_settings(&args.config_file).await?;

    match args.subcommand {
        Cmd::Daemon(args) => commands::daemon::run(args, settings).await,
        Cmd::Run(args) => commands::job::run_now(args, settings).await,
        Cmd::Restore(args) => commands::files::restore(args, settings).await,
        Cmd::Job(args) => match args.subcommand {
            cli::job::Cmd::Add(args) => commands::job::add(args, &settings),
            cli::job::Cmd::List => commands::job::list(&settings),
            cli::job::Cmd::Remove { name } => commands::job::remove(&name, &settings),
        },
        Cmd::Destination(args) => match args.subcommand {
            cli::destination::Cmd::Add {
                name,
                location,
                provider,
            } => commands::destination::add(&name, &location, &provider, &settings),
            cli::destination::Cmd::List => commands::destination::list(&settings).await,
            cli::destination::Cmd::Remove { name } => {
                commands::destination::remove(&name, &settings)
            }
        },
        Cmd::Check(args) => commands::check::run(args, settings).await,
        Cmd::Search(args) => commands::files::search(args, &settings),
        Cmd::History => commands::files::history(&settings),
        Cmd::Config => commands::config(&settings),
        Cmd::Version => commands::version(),
    }
}
