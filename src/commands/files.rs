use super::daemon::setup_logger;
use crate::{cli, commands};
use eyre::eyre;
use humansize::{format_size, WINDOWS};
use packrat_core::{
    cancellation::Reason,
    config::Settings,
    model::{ArchiveLocation, ArchivedFile, Recipient, RestoreRecord},
    store::JobStore,
    timestamp, Timestamp,
};
use packrat_daemon::job::{RestoreEntry, RestoreRequest};

fn parse_archive(s: &str) -> eyre::Result<ArchiveLocation> {
    let location: ArchiveLocation = s.parse().unwrap_or_else(|never| match never {});
    match location {
        ArchiveLocation::Local(path) if path.is_relative() => {
            Ok(ArchiveLocation::Local(std::env::current_dir()?.join(path)))
        }
        location => Ok(location),
    }
}

fn restore_entries(
    store: &dyn JobStore,
    archive: &ArchiveLocation,
    entries: Vec<String>,
) -> eyre::Result<Vec<RestoreEntry>> {
    let entries = if entries.is_empty() {
        store
            .files_in_archive(archive)?
            .into_iter()
            .map(|file| file.entry_name)
            .collect()
    } else {
        entries
    };
    if entries.is_empty() {
        eyre::bail!("no files recorded for {archive}");
    }
    Ok(entries
        .into_iter()
        .map(|entry_name| RestoreEntry {
            archive: archive.clone(),
            entry_name,
        })
        .collect())
}

pub async fn restore(args: cli::restore::Cli, settings: Settings) -> eyre::Result<()> {
    setup_logger(None)?;

    let store = commands::open_database(&settings)?;
    let archive = parse_archive(&args.archive)?;
    let entries = restore_entries(&*store, &archive, args.entries)?;
    let daemon = commands::build_daemon(settings, store)?;

    let mut request = RestoreRequest::new(entries, args.to);
    if let Some(email) = args.email {
        request = request.notify(Recipient(email));
    }
    let started = daemon.start_restore(request);
    let cancel = started.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel(Reason::UserRequest);
        }
    });

    let finished = started.wait().await?;
    match finished.result {
        Ok(report) => {
            println!(
                "{} {} entries from {} archives ({}).",
                finished.message,
                report.entries,
                report.archives,
                format_size(report.bytes, WINDOWS)
            );
            Ok(())
        }
        Err(_) => Err(eyre!(finished.message)),
    }
}

fn format_ts(ts: &Timestamp) -> String {
    timestamp::format(ts).unwrap_or_else(|_| "-".to_owned())
}

fn describe_file(file: &ArchivedFile) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        file.entry_name,
        format_size(file.size, WINDOWS),
        file.archive,
        format_ts(&file.recorded_at),
    )
}

pub fn search(args: cli::search::Cli, settings: &Settings) -> eyre::Result<()> {
    let store = commands::open_database(settings)?;
    if args.duplicates {
        for (entry_name, archives) in store.find_duplicates()? {
            println!("{entry_name}");
            for archive in archives {
                println!("  {archive}");
            }
        }
        return Ok(());
    }

    let files = store.search_files(args.query.as_deref().unwrap_or_default(), args.limit)?;
    if files.is_empty() {
        println!("no matching files");
    }
    for file in &files {
        println!("{}", describe_file(file));
    }
    Ok(())
}

fn describe_restore(record: &RestoreRecord) -> String {
    let finished = record
        .finished_at
        .as_ref()
        .map(format_ts)
        .unwrap_or_else(|| "-".to_owned());
    format!(
        "{}\t{}\t{}\t{}\t{} entries into {}",
        record.label,
        record.status,
        format_ts(&record.started_at),
        finished,
        record.entries.len(),
        record.destination.display(),
    )
}

pub fn history(settings: &Settings) -> eyre::Result<()> {
    let store = commands::open_database(settings)?;
    let records = store.list_restore_history()?;
    if records.is_empty() {
        println!("no restores yet");
    }
    for record in &records {
        println!("{}", describe_restore(record));
    }
    Ok(())
}
