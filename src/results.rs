mod db_result;
mod result_set;
mod row;

pub use db_result::DbResult;
pub use result_set::ResultSet;
pub use row::CustomDbRow;
