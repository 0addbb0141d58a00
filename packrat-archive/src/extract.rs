use packrat_core::{
    archive::{ExtractError, Extractor},
    cancellation::Token,
};
use std::{
    fs::{self, File},
    io::{self, BufReader},
    path::Path,
};
use zip::{result::ZipError, ZipArchive};

#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ExtractError + '_ {
    move |e| ExtractError::Io(path.to_owned(), e)
}

impl Extractor for ZipExtractor {
    fn extract(
        &self,
        archive: &Path,
        entries: &[String],
        destination: &Path,
        cancel: &Token,
    ) -> Result<u64, ExtractError> {
        let file = File::open(archive).map_err(io_error(archive))?;
        let mut zip = ZipArchive::new(BufReader::new(file))
            .map_err(|e| ExtractError::Archive(e.into()))?;
        fs::create_dir_all(destination).map_err(io_error(destination))?;

        let mut written = 0;
        for name in entries {
            cancel.check()?;
            let mut entry = match zip.by_name(&name.replace('\\', "/")) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => return Err(ExtractError::MissingEntry(name.clone())),
                Err(e) => return Err(ExtractError::Archive(e.into())),
            };
            let relative = entry
                .enclosed_name()
                .map(|p| p.to_path_buf())
                .ok_or_else(|| ExtractError::UnsafeEntry(name.clone()))?;
            let target = destination.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(io_error(&target))?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            let mut out = File::create(&target).map_err(io_error(&target))?;
            written += io::copy(&mut entry, &mut out).map_err(io_error(&target))?;
            tracing::debug!(entry = %name, target = %target.display(), "extracted");
        }
        Ok(written)
    }
}
