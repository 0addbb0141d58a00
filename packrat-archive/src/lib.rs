mod extract;
mod pack;

pub use extract::ZipExtractor;
pub use pack::ZipPackager;
