use crate::error::Result;

use super::database::Database;
use super::table::Table;

// ---------------------------------------------------------------------------
// TableBuilder
// ---------------------------------------------------------------------------

/// Builder for creating a new table.
pub struct TableBuilder<'a> {
    db: &'a Database,
    name: String,
    timestamped: bool,
}

impl<'a> TableBuilder<'a> {
    pub(crate) fn new(db: &'a Database, name: String) -> Self {
        Self {
            db,
            name,
            timestamped: true,
        }
    }

    /// Whether the table honors timestamps (default `true`). A table without
    /// timestamps treats every timestamp as `TS_NONE` and ignores
    /// rollback-to-stable.
    pub fn timestamped(mut self, timestamped: bool) -> Self {
        self.timestamped = timestamped;
        self
    }

    /// Create the table. Fails if a table with this name already exists.
    pub fn execute(self) -> Result<Table> {
        self.db.register_table(self.name, self.timestamped)
    }
}
