use packrat_core::{
    archive::{archive_file_name, PackAction, PackError, PackOutcome, Package, PackedEntry, Packager},
    cancellation::Token,
    conflict::{self, ConflictPolicy},
    Timestamp,
};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;
use zip::{write::FileOptions, CompressionMethod, ZipArchive, ZipWriter};

/// Writes deflate-compressed zip archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipPackager;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PackError + '_ {
    move |e| PackError::Io(path.to_owned(), e)
}

fn archive_error(e: zip::result::ZipError) -> PackError {
    PackError::Archive(e.into())
}

impl Packager for ZipPackager {
    fn pack(
        &self,
        source: &Path,
        output_root: &Path,
        policy: &ConflictPolicy,
        cancel: &Token,
    ) -> Result<PackOutcome, PackError> {
        if !source.exists() {
            return Err(PackError::MissingSource(source.to_owned()));
        }
        std::fs::create_dir_all(output_root).map_err(io_error(output_root))?;
        let initial = output_root.join(archive_file_name(source, "zip"));
        let existed = initial.exists();
        let path = match conflict::resolve(&initial, policy)? {
            Some(path) => path,
            None => return Ok(PackOutcome::Declined),
        };
        let action = if path != initial {
            PackAction::Renamed
        } else if existed {
            PackAction::Overwritten
        } else {
            PackAction::Created
        };

        let files = source_files(source)?;
        tracing::info!(archive = %path.display(), files = files.len(), ?action, "writing archive");
        match write_archive(&path, files, cancel) {
            Ok(entries) => Ok(PackOutcome::Packed(Package {
                action,
                path,
                entries,
            })),
            Err(err) => {
                if let Err(error) = std::fs::remove_file(&path) {
                    tracing::warn!(%error, path = %path.display(), "failed to remove partial archive");
                }
                Err(err)
            }
        }
    }
}

/// Files to pack with their entry names, in a stable order. Symlinks are skipped.
fn source_files(source: &Path) -> Result<Vec<(PathBuf, String)>, PackError> {
    if source.is_file() {
        return Ok(vec![(source.to_owned(), archive_entry_base(source))]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(source).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_owned();
            PackError::Io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or_else(|_| entry.path());
        let entry_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.into_path(), entry_name));
    }
    Ok(files)
}

fn archive_entry_base(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_owned())
}

fn zip_time(ts: Timestamp) -> Option<zip::DateTime> {
    let year = u16::try_from(ts.year()).ok()?;
    zip::DateTime::from_date_and_time(
        year,
        ts.month().into(),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
    )
    .ok()
}

fn write_archive(
    path: &Path,
    files: Vec<(PathBuf, String)>,
    cancel: &Token,
) -> Result<Vec<PackedEntry>, PackError> {
    let out = File::create(path).map_err(io_error(path))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let mut entries = Vec::with_capacity(files.len());
    for (original_path, entry_name) in files {
        cancel.check()?;
        let metadata = std::fs::metadata(&original_path).map_err(io_error(&original_path))?;
        let modified_at = metadata.modified().ok().map(Timestamp::from);
        let mut options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(metadata.len() >= u32::MAX as u64);
        if let Some(time) = modified_at.and_then(zip_time) {
            options = options.last_modified_time(time);
        }
        zip.start_file(entry_name.as_str(), options)
            .map_err(archive_error)?;
        let mut input = File::open(&original_path).map_err(io_error(&original_path))?;
        let size = io::copy(&mut input, &mut zip).map_err(io_error(&original_path))?;
        entries.push(PackedEntry {
            original_path,
            entry_name,
            size,
            compressed_size: 0,
            modified_at,
        });
    }
    let mut out = zip.finish().map_err(archive_error)?;
    out.flush().map_err(io_error(path))?;
    drop(out);

    // compressed sizes are only known once the archive is complete
    let archive = File::open(path).map_err(io_error(path))?;
    let mut archive = ZipArchive::new(archive).map_err(archive_error)?;
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.compressed_size = archive.by_index(index).map_err(archive_error)?.compressed_size();
    }
    Ok(entries)
}
