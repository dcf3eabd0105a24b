mod daily_bar;
mod universe;

pub use daily_bar::{DailyBar, SourceBar};
pub use universe::{ConflictPolicy, Universe};
