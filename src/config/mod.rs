pub mod archiver;

pub use archiver::ArchiverConfig;
