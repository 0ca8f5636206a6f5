pub mod resolve;
pub mod series;
pub mod source;

pub use resolve::{resolve, Direction, FORWARD_TOLERANCE_DAYS};
pub use series::{PriceObservation, PriceSeries};
pub use source::{LocalSeries, PriceSource};
