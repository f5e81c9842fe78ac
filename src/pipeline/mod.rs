//! Pure pipeline stages that turn a rendered portal page into JSON records.
//!
//! Nothing in here touches the browser; every stage works on strings or
//! parsed HTML and is testable against fixtures.
//!
//! ## Data Flow
//!
//! ```text
//! page HTML ──▶ table ──▶ normalize ──▶ temporal ──▶ persist
//!              (locate)   (clean text)  (dates/times)  (JSON file)
//! ```
//!
//! 1. [`table`]: locate the table, read the header row, derive a schema,
//!    zip body rows into records
//! 2. [`normalize`]: strip non-ASCII and disallowed characters from every
//!    header and cell
//! 3. [`temporal`]: canonicalise date columns and render duration columns
//!    as 12-hour clock times
//! 4. [`persist`]: atomic pretty-JSON write into the output directory

pub mod normalize;
pub mod persist;
pub mod table;
pub mod temporal;
