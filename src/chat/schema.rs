//! Ledger schema description
//!
//! The text block handed to the model so it can write queries against the
//! expense ledger. Maintained by hand and versioned: bump
//! [`SCHEMA_VERSION`] whenever the underlying MySQL schema changes, so logs
//! can tell which description a query was generated against.

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 3;

const SCHEMA_TEXT: &str = r#"
🔹 Table: accounts
  - accountId (bigint(20)) NOT NULL
  - accountIBAN (varchar(34)) NOT NULL
  - accountTyp (varchar(50)) NULL
  - accountCategory (varchar(50)) NULL
  - balance (varchar(50)) NOT NULL
  - currency (varchar(3)) NOT NULL

🔹 Table: categories
  - categoryId (bigint(20)) NOT NULL
  - categoryName (varchar(255)) NOT NULL
  - categoryType (varchar(50)) NULL
  - predefined (tinyint(1)) NULL

🔹 Table: subcategories
  - subCategoryId (bigint(20)) NOT NULL
  - categoryId (bigint(20)) NOT NULL
  - subCategoryName (varchar(255)) NOT NULL
  - urgency (varchar(50)) NULL
  - predefined (tinyint(1)) NULL

🔹 Table: transactions
  - transactionId (varchar(36)) NOT NULL
  - accountId (bigint(20)) NOT NULL
  - categoryId (bigint(20)) NOT NULL
  - subcategoryId (bigint(20)) NOT NULL
  - date (bigint(20)) NOT NULL
  - amount (varchar(50)) NOT NULL
  - type (varchar(50)) NULL
  - frequency (varchar(50)) NULL
  - currency (varchar(3)) NOT NULL
  - description (text) NULL
"#;

/// Human-maintained description of the queryable tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaDescription {
    version: u32,
    text: String,
}

impl SchemaDescription {
    /// The description for the current ledger schema.
    pub fn current() -> Self {
        Self {
            version: SCHEMA_VERSION,
            text: SCHEMA_TEXT.to_string(),
        }
    }

    /// A custom description, mainly for tests and alternate deployments.
    pub fn new(version: u32, text: impl Into<String>) -> Self {
        Self {
            version,
            text: text.into(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Default for SchemaDescription {
    fn default() -> Self {
        Self::current()
    }
}
