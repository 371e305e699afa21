mod table_name;

pub use table_name::{DEFAULT_SCHEMA, TableName, TableNameError};
