use thiserror::Error;

/// The packed chapter flags of a manga hold a value no build understands.
///
/// This is a contract violation between whoever wrote the flags and the
/// engine reading them. It is never defaulted away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("unknown chapter sort field bits {0:#x}")]
    UnknownSortField(u32),
    #[error("unknown chapter read filter bits {0:#x}")]
    UnknownReadFilter(u32),
}
