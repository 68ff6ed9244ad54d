pub mod apis;
pub mod opportunities;
pub mod tools;
pub mod utils;
pub mod workbook;
pub mod year_range;
