//! Library components of the `tankobon` command line tool.

pub mod library;
pub mod logging;
pub mod settings;
pub mod workspace;
