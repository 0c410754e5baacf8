//! Analyzer configuration
//!
//! Deserialised from TOML; every field has a default so a config file only
//! names what it overrides. Extensions are normalised to lowercase with no
//! leading dot at load time.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::AnalyzerError;

/// Configuration for an extraction run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Root directory to walk for source files.
    pub source_root: PathBuf,
    /// Base directory for the database and other artifacts.
    pub output_dir: PathBuf,
    /// File name of the object store database inside `output_dir`.
    pub database_filename: String,
    /// Accepted file extensions (no leading dot, matched case-insensitively).
    pub file_extensions: Vec<String>,
    /// Path components stripped when deriving the canonical stored path.
    pub exclude_from_processed_path: Vec<String>,
    /// Path components ignored when deriving a package name from a path.
    pub exclude_for_package_derivation: Vec<String>,
    /// Case-insensitive blacklist applied to call candidates.
    pub call_keywords_to_drop: Vec<String>,
    /// Drop call candidates whose terminator is `;`.
    pub strict_lpar_only_calls: bool,
    /// Keep call candidates that have no parenthesis at all.
    pub allow_parameterless_calls: bool,
    /// Stored paths to reprocess regardless of their hash.
    pub force_reprocess: BTreeSet<String>,
    /// Stored paths whose records are deleted before the run.
    pub clear_history_for_file: BTreeSet<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            source_root: PathBuf::from("."),
            output_dir: PathBuf::from("artifacts"),
            database_filename: "code_objects.db".into(),
            file_extensions: vec!["sql".into()],
            exclude_from_processed_path: Vec::new(),
            exclude_for_package_derivation: vec![
                "procedures".into(),
                "package_bodies".into(),
                "functions".into(),
            ],
            call_keywords_to_drop: DEFAULT_CALL_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strict_lpar_only_calls: false,
            allow_parameterless_calls: true,
            force_reprocess: BTreeSet::new(),
            clear_history_for_file: BTreeSet::new(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, AnalyzerError> {
        let mut config: AnalyzerConfig = toml::from_str(toml_str)
            .map_err(|e| AnalyzerError::Config(e.to_string()))?;
        config.normalise();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, AnalyzerError> {
        let text = std::fs::read_to_string(path).map_err(|source| AnalyzerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Location of the object store database.
    pub fn database_path(&self) -> PathBuf {
        self.output_dir.join(&self.database_filename)
    }

    fn normalise(&mut self) {
        for ext in &mut self.file_extensions {
            *ext = ext.trim_start_matches('.').to_lowercase();
        }
        self.file_extensions.retain(|ext| !ext.is_empty());
    }
}

/// Call candidates whose upper-cased name matches an entry here are never
/// treated as dependencies: SQL commands, control-flow words, datatypes,
/// and the usual built-in packages.
pub const DEFAULT_CALL_KEYWORDS: &[&str] = &[
    // Aggregate and analytic functions
    "COUNT",
    "SUM",
    "AVG",
    "MIN",
    "MAX",
    "LISTAGG",
    "ROW_NUMBER",
    "RANK",
    "DENSE_RANK",
    "LAG",
    "LEAD",
    // Commands
    "CREATE",
    "ALTER",
    "DROP",
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "COMMIT",
    "ROLLBACK",
    "GRANT",
    "REVOKE",
    "MERGE",
    "FROM",
    "SAVEPOINT",
    // Scalar functions
    "UPPER",
    "LOWER",
    "SUBSTR",
    "INSTR",
    "LENGTH",
    "REPLACE",
    "TRIM",
    "ROUND",
    "TRUNC",
    "MOD",
    "CEIL",
    "FLOOR",
    "SYSDATE",
    "CURRENT_DATE",
    "ADD_MONTHS",
    "MONTHS_BETWEEN",
    "LAST_DAY",
    "EXTRACT",
    "TO_CHAR",
    "TO_DATE",
    "TO_NUMBER",
    "NVL",
    "NVL2",
    "COALESCE",
    "DECODE",
    "SQLCODE",
    "SQLERRM",
    // Built-in packages
    "UTL_FILE.FOPEN",
    "UTL_FILE.PUT_LINE",
    "UTL_FILE.GET_LINE",
    "UTL_FILE.FCLOSE",
    "DBMS_RANDOM.VALUE",
    "DBMS_RANDOM.STRING",
    "DBMS_METADATA.GET_DDL",
    "DBMS_LOB.GETLENGTH",
    "DBMS_LOB.SUBSTR",
    "DBMS_SQL.OPEN_CURSOR",
    "DBMS_SQL.EXECUTE",
    "DBMS_SQL.PARSE",
    "DBMS_SQL.CLOSE_CURSOR",
    "DBMS_OUTPUT.PUT_LINE",
    "DBMS_OUTPUT.ENABLE",
    "DBMS_LOCK.SLEEP",
    "DBMS_SCHEDULER.CREATE_JOB",
    "DBMS_SCHEDULER.RUN_JOB",
    "RAISE_APPLICATION_ERROR",
    // Structure and control flow
    "DECLARE",
    "BEGIN",
    "END",
    "IF",
    "THEN",
    "ELSIF",
    "ELSE",
    "CASE",
    "LOOP",
    "WHILE",
    "FOR",
    "IN",
    "REVERSE",
    "EXIT",
    "CONTINUE",
    "GOTO",
    "RETURN",
    "NULL",
    "AND",
    "OR",
    // Declarations and types
    "CONSTANT",
    "DEFAULT",
    "PROCEDURE",
    "FUNCTION",
    "PACKAGE",
    "BODY",
    "TYPE",
    "SUBTYPE",
    "RECORD",
    "TABLE",
    "VARRAY",
    "IS",
    "AS",
    "PRAGMA",
    "VARCHAR2",
    "NVARCHAR2",
    "NUMBER",
    "PLS_INTEGER",
    "BINARY_INTEGER",
    "BINARY_FLOAT",
    "BINARY_DOUBLE",
    "BOOLEAN",
    "DATE",
    "TIMESTAMP",
    "CLOB",
    "NCLOB",
    "BLOB",
    "BFILE",
    "ROWID",
    "UROWID",
    "CHAR",
    "NCHAR",
    "LONG",
    "RAW",
    // Cursors
    "CURSOR",
    "OPEN",
    "FETCH",
    "CLOSE",
    "FORALL",
    // Exceptions
    "EXCEPTION",
    "WHEN",
    "OTHERS",
    "RAISE",
];
