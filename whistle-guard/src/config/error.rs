use thiserror::Error;

/// Errors raised while applying a rules document to a suite.
///
/// Every variant is raised before any check runs. Messages name the offending
/// key and, for column keys, the column.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RulesError {
    /// The document could not be parsed as YAML.
    #[error("could not parse rules document: {0}")]
    Syntax(String),

    /// The top level of the document is not a mapping.
    #[error("error converting YAML markup in {file}")]
    NotAMapping {
        /// File (or other source) the document came from
        file: String,
    },

    /// A top-level key other than `table` or `columns`.
    #[error("unexpected yaml attribute: {0}")]
    UnknownTopLevelKey(String),

    /// The `table` section is not a mapping.
    #[error("table: want a mapping of table attributes")]
    TableNotMapping,

    /// A key in the `table` section this library does not know.
    #[error("unexpected table attribute: {0}")]
    UnknownTableKey(String),

    /// A table attribute that needs an integer got something else.
    #[error("table: {key} want an integer, got {value}")]
    TableInteger {
        /// Attribute name
        key: String,
        /// Value as written in the document
        value: String,
    },

    /// The `columns` section is not a list of mappings.
    #[error("columns: want a list of column mappings")]
    ColumnsNotList,

    /// A column entry is missing its name.
    #[error("column name missing")]
    MissingColumnName,

    /// A column entry has a name that is not a string.
    #[error("column name must be a string, got {0}")]
    InvalidColumnName(String),

    /// A column entry is missing its type.
    #[error("column {column}: column type missing")]
    MissingColumnType {
        /// Column name
        column: String,
    },

    /// A column key this library does not know.
    #[error("column {column}: unexpected column attribute: {key}")]
    UnknownColumnKey {
        /// Column name
        column: String,
        /// The unexpected key
        key: String,
    },

    /// A declared column type other than `numeric`, `string` or `datetime`.
    #[error("column {column}: column type {column_type} not recognised")]
    UnknownColumnType {
        /// Column name
        column: String,
        /// The declared type
        column_type: String,
    },

    /// A boolean attribute got something outside the accepted literals.
    #[error("{key}: want boolean value, got {value}")]
    InvalidBool {
        /// Attribute name, prefixed with the column for column attributes
        key: String,
        /// Value as written in the document
        value: String,
    },

    /// A column attribute that needs an integer got something else.
    #[error("column {column} {key} want an integer, got {value}")]
    ColumnInteger {
        /// Column name
        column: String,
        /// Attribute name
        key: String,
        /// Value as written in the document
        value: String,
    },

    /// A column attribute that needs a number got something else.
    #[error("column {column} {key} want a number, got {value}")]
    ColumnNumber {
        /// Column name
        column: String,
        /// Attribute name
        key: String,
        /// Value as written in the document
        value: String,
    },

    /// A column attribute that needs a string got something else.
    #[error("column {column} {key} want a string, got {value}")]
    ColumnString {
        /// Column name
        column: String,
        /// Attribute name
        key: String,
        /// Value as written in the document
        value: String,
    },

    /// `regex_rule` on a column that is not declared as `string`.
    #[error("column {column} is of type {column_type}, but must be of type string for regex_rules")]
    RegexRequiresString {
        /// Column name
        column: String,
        /// The declared type
        column_type: String,
    },

    /// A `regex_type` other than `mandatory` or `exclude`.
    #[error("column {column}: regex_type {value} not recognised")]
    UnknownRegexType {
        /// Column name
        column: String,
        /// Value as written in the document
        value: String,
    },
}

impl From<serde_yaml::Error> for RulesError {
    fn from(err: serde_yaml::Error) -> Self {
        RulesError::Syntax(err.to_string())
    }
}
