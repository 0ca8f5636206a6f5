pub mod report_date;

pub use report_date::{parse_price_date, parse_report_date};
