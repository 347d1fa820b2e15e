use thiserror::Error;

#[derive(Error, Debug)]
pub enum SawitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid name '{0}'")]
    NameInvalid(String),

    #[error("Table '{0}' already exists")]
    NameTaken(String),

    #[error("Table '{0}' does not exist")]
    TableMissing(String),

    #[error("Column count does not match value count")]
    ColumnsValuesMismatch,

    #[error("Catalog page is full: cannot create more tables")]
    PageZeroFull,

    #[error("Record of {0} bytes exceeds page capacity")]
    RecordTooLarge(usize),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("WAL corrupt: {0}")]
    WalCorrupt(String),

    #[error("Database handle is closed")]
    HandleClosed,

    #[error("Page overflow: data exceeds page capacity")]
    PageOverflow,

    #[error("Invalid page format")]
    InvalidPage,

    #[error("Page not found: page_id={0}")]
    PageNotFound(u32),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Execution error: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, SawitError>;
